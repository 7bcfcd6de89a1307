use crate::error::{Error, Result};
use crate::read;
use crate::read::common::{self as read_common, Item, Page, PageSource, ReadOutput, ReadRequest};

use futures::Stream;
use serde::Serialize;

/// Scan request in wire form.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanRequest {
    /// Fields shared with queries.
    pub read: ReadRequest,
    /// The segment to read for parallel scans (0-indexed).
    pub segment: Option<i32>,
    /// The total number of segments for parallel scans.
    pub total_segments: Option<i32>,
}

impl read_common::Paginated for ScanRequest {
    fn validate(&self) -> Result<()> {
        if self.segment.is_some() != self.total_segments.is_some() {
            return Err(Error::invalid(
                "segment and total segments must be set together",
            ));
        }
        self.read.validate(&[])
    }

    fn set_exclusive_start_key(&mut self, key: Item) {
        self.read.exclusive_start_key = Some(key);
    }
}

/// Scan operation over a whole table or index.
///
/// ```rust,no_run
/// use aws_sdk_dynamodb::Client;
/// use drive_data::read;
/// use serde_json::Value;
///
/// # async fn example(client: &Client) -> Result<(), Box<dyn std::error::Error>> {
/// let scan: read::scan::Scan<Value> = read::scan::Scan {
///     read_args: read::common::ReadArgs {
///         table_name: "honda-hackathon1".to_string(),
///         ..Default::default()
///     },
///     ..Default::default()
/// };
/// let output = scan.send(client).await?;
/// println!("Scanned {} logs in {} pages", output.count(), output.pages);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scan<T> {
    /// Table, projection, index and paging arguments.
    pub read_args: read::common::ReadArgs<T>,
    /// The segment number for parallel scans (0-indexed).
    pub segment: Option<i32>,
    /// The total number of segments for parallel scans.
    pub total_segments: Option<i32>,
}

impl<T: Serialize> TryFrom<Scan<T>> for ScanRequest {
    type Error = Error;

    fn try_from(scan: Scan<T>) -> Result<Self> {
        Ok(Self {
            read: scan.read_args.try_into()?,
            segment: scan.segment,
            total_segments: scan.total_segments,
        })
    }
}

impl<T: Serialize + Clone> Scan<T> {
    /// Lazily fetch every page, starting from the first one on each call.
    pub fn pages<'a, S: PageSource>(&self, source: &'a S) -> impl Stream<Item = Result<Page>> + 'a {
        let request = ScanRequest::try_from(self.clone());
        read_common::paginate(request, move |request| source.scan_page(request))
    }

    /// Lazily fetch every item across all pages.
    pub fn items<'a, S: PageSource>(&self, source: &'a S) -> impl Stream<Item = Result<Item>> + 'a {
        read_common::flatten_items(self.pages(source))
    }

    /// Execute the scan, following continuation tokens until the last page.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "drive_data.scan",
            skip_all,
            fields(table = %self.read_args.table_name),
            err
        )
    )]
    pub async fn send<S: PageSource>(&self, source: &S) -> Result<ReadOutput> {
        read_common::collect_pages(self.pages(source)).await
    }
}
