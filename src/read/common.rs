use crate::common;
use crate::error::{Error, Result};
use crate::read::{query::QueryRequest, scan::ScanRequest};

use async_stream::try_stream;
use aws_sdk_dynamodb::{Client, types};
use futures::{Stream, TryStreamExt, stream};
use serde::{Serialize, de::DeserializeOwned};
use serde_dynamo::to_attribute_value;
use std::{collections, future::Future};

/// A single DynamoDB item: attribute name to typed value.
pub type Item = collections::HashMap<String, types::AttributeValue>;

/// One page of results and the token to resume after it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Page {
    /// Items in the order the service returned them.
    pub items: Vec<Item>,
    /// Continuation token (`LastEvaluatedKey`), absent on the last page.
    pub last_evaluated_key: Option<Item>,
}

impl Page {
    /// The token for the next page, if there is one.
    ///
    /// An empty key map is treated the same as an absent one.
    pub fn continuation(&self) -> Option<&Item> {
        self.last_evaluated_key
            .as_ref()
            .filter(|key| !key.is_empty())
    }
}

/// Backend that executes one page request at a time.
///
/// Implemented for [`aws_sdk_dynamodb::Client`]; anything else that can answer a
/// query or a scan page (a recording, a local table) can stand in for it.
pub trait PageSource {
    /// Fetch a single query page.
    fn query_page(&self, request: QueryRequest) -> impl Future<Output = Result<Page>> + Send;

    /// Fetch a single scan page.
    fn scan_page(&self, request: ScanRequest) -> impl Future<Output = Result<Page>> + Send;
}

macro_rules! apply_read_request {
    ($builder:expr, $read:expr) => {
        $builder
            .set_consistent_read($read.consistent_read)
            .set_exclusive_start_key($read.exclusive_start_key)
            .set_expression_attribute_names($read.expression_attribute_names)
            .set_expression_attribute_values($read.expression_attribute_values)
            .set_index_name($read.index_name)
            .set_limit($read.limit)
            .set_projection_expression($read.projection_expression)
            .table_name($read.table_name)
    };
}

impl PageSource for Client {
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "drive_data.query_page",
            skip_all,
            fields(table = %request.read.table_name),
            err
        )
    )]
    async fn query_page(&self, request: QueryRequest) -> Result<Page> {
        let builder = self
            .query()
            .key_condition_expression(request.key_condition_expression)
            .set_scan_index_forward(request.scan_index_forward);
        let output = apply_read_request!(builder, request.read).send().await?;
        Ok(Page {
            items: output.items.unwrap_or_default(),
            last_evaluated_key: output.last_evaluated_key,
        })
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "drive_data.scan_page",
            skip_all,
            fields(table = %request.read.table_name),
            err
        )
    )]
    async fn scan_page(&self, request: ScanRequest) -> Result<Page> {
        let builder = self
            .scan()
            .set_segment(request.segment)
            .set_total_segments(request.total_segments);
        let output = apply_read_request!(builder, request.read).send().await?;
        Ok(Page {
            items: output.items.unwrap_or_default(),
            last_evaluated_key: output.last_evaluated_key,
        })
    }
}

/// Request fields shared by Query and Scan, in wire form.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReadRequest {
    /// Strongly consistent read when `Some(true)`.
    pub consistent_read: Option<bool>,
    /// Continuation token to resume from.
    pub exclusive_start_key: Option<Item>,
    /// `#name` placeholder bindings.
    pub expression_attribute_names: Option<collections::HashMap<String, String>>,
    /// `:value` placeholder bindings.
    pub expression_attribute_values: Option<collections::HashMap<String, types::AttributeValue>>,
    /// Secondary index to read instead of the base table.
    pub index_name: Option<String>,
    /// Maximum number of items evaluated per page.
    pub limit: Option<i32>,
    /// Attributes to return.
    pub projection_expression: Option<String>,
    /// The table to read.
    pub table_name: String,
}

impl ReadRequest {
    /// Create a request against a table with no bindings.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Default::default()
        }
    }

    pub(crate) fn validate(&self, expressions: &[&str]) -> Result<()> {
        if self.table_name.is_empty() {
            return Err(Error::invalid("table name must not be empty"));
        }
        let expressions = expressions
            .iter()
            .copied()
            .chain(self.projection_expression.as_deref());
        let (used_names, used_values) = placeholders(expressions);
        check_bound(
            "name",
            &used_names,
            self.expression_attribute_names.as_ref().map(|names| names.keys()),
        )?;
        check_bound(
            "value",
            &used_values,
            self.expression_attribute_values
                .as_ref()
                .map(|values| values.keys()),
        )
    }
}

fn placeholders<'a>(
    expressions: impl Iterator<Item = &'a str>,
) -> (
    collections::BTreeSet<&'a str>,
    collections::BTreeSet<&'a str>,
) {
    let mut names = collections::BTreeSet::new();
    let mut values = collections::BTreeSet::new();
    for expression in expressions {
        let bytes = expression.as_bytes();
        let mut start = 0;
        while start < bytes.len() {
            let sigil = bytes[start];
            if sigil != b'#' && sigil != b':' {
                start += 1;
                continue;
            }
            let end = bytes[start + 1..]
                .iter()
                .position(|b| !(b.is_ascii_alphanumeric() || *b == b'_'))
                .map_or(bytes.len(), |offset| start + 1 + offset);
            if end > start + 1 {
                let token = &expression[start..end];
                match sigil {
                    b'#' => names.insert(token),
                    _ => values.insert(token),
                };
            }
            start = end;
        }
    }
    (names, values)
}

fn check_bound<'a>(
    kind: &str,
    used: &collections::BTreeSet<&str>,
    bound: Option<impl Iterator<Item = &'a String>>,
) -> Result<()> {
    let bound: collections::BTreeSet<&str> = bound
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect();
    if let Some(missing) = used.difference(&bound).next() {
        return Err(Error::invalid(format!(
            "expression {kind} placeholder {missing} is not bound"
        )));
    }
    if let Some(unused) = bound.difference(used).next() {
        return Err(Error::invalid(format!(
            "expression {kind} placeholder {unused} is bound but never used"
        )));
    }
    Ok(())
}

/// Arguments shared by [`Query`](crate::read::query::Query) and [`Scan`](crate::read::scan::Scan).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReadArgs<T> {
    /// Whether to use a strongly consistent read.
    pub consistent_read: Option<bool>,
    /// Start after this key instead of at the beginning.
    ///
    /// Typically the `last_evaluated_key` of a page from an earlier read.
    pub exclusive_start_key: Option<collections::HashMap<String, T>>,
    /// Global or local secondary index to read.
    pub index_name: Option<String>,
    /// Maximum number of items evaluated per page, not in total.
    pub limit: Option<i32>,
    /// Which attributes to return. `None` returns every attribute.
    pub selection: Option<common::selection::SelectionMap>,
    /// The name of the table to read from.
    pub table_name: String,
}

impl<T: Serialize> TryFrom<ReadArgs<T>> for ReadRequest {
    type Error = Error;

    fn try_from(read_args: ReadArgs<T>) -> Result<Self> {
        let exclusive_start_key = read_args
            .exclusive_start_key
            .map(|key| {
                key.into_iter()
                    .map(|(name, value)| {
                        let value: types::AttributeValue = to_attribute_value(value)?;
                        Ok((name, value))
                    })
                    .collect::<Result<Item>>()
            })
            .transpose()?;
        let mut request = Self {
            consistent_read: read_args.consistent_read,
            exclusive_start_key,
            index_name: read_args.index_name,
            limit: read_args.limit,
            table_name: read_args.table_name,
            ..Default::default()
        };
        if let Some(selection) = read_args.selection {
            let selection: common::ExpressionInput = selection.into();
            request.projection_expression = Some(selection.merge_into(
                &mut request.expression_attribute_names,
                &mut request.expression_attribute_values,
            ));
        }
        Ok(request)
    }
}

/// Everything a paginated read returned.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReadOutput {
    /// All items, concatenated in page order.
    pub items: Vec<Item>,
    /// Number of pages fetched.
    pub pages: usize,
}

impl ReadOutput {
    /// Number of items returned.
    pub fn count(&self) -> usize {
        self.items.len()
    }

    /// Decode the items into typed records.
    pub fn deserialize<T: DeserializeOwned>(self) -> Result<Vec<T>> {
        serde_dynamo::from_items(self.items).map_err(|error| Error::Decode {
            message: error.to_string(),
        })
    }
}

pub(crate) trait Paginated: Clone {
    fn validate(&self) -> Result<()>;

    fn set_exclusive_start_key(&mut self, key: Item);
}

/// Lazily fetch pages, following continuation tokens until none is returned.
pub(crate) fn paginate<'a, R, F, Fut>(
    request: Result<R>,
    mut fetch: F,
) -> impl Stream<Item = Result<Page>> + 'a
where
    R: Paginated + 'a,
    F: FnMut(R) -> Fut + 'a,
    Fut: Future<Output = Result<Page>> + 'a,
{
    try_stream! {
        let mut request = request?;
        request.validate()?;
        loop {
            let page = fetch(request.clone()).await?;
            let continuation = page.continuation().cloned();
            trace_page(&page);
            yield page;
            match continuation {
                Some(key) => request.set_exclusive_start_key(key),
                None => break,
            }
        }
    }
}

#[cfg(feature = "tracing")]
fn trace_page(page: &Page) {
    tracing::debug!(
        items = page.items.len(),
        more = page.continuation().is_some(),
        "fetched page"
    );
}

#[cfg(not(feature = "tracing"))]
fn trace_page(_page: &Page) {}

pub(crate) fn flatten_items<'a>(
    pages: impl Stream<Item = Result<Page>> + 'a,
) -> impl Stream<Item = Result<Item>> + 'a {
    pages
        .map_ok(|page| stream::iter(page.items.into_iter().map(Ok::<Item, Error>)))
        .try_flatten()
}

pub(crate) async fn collect_pages(pages: impl Stream<Item = Result<Page>>) -> Result<ReadOutput> {
    let mut output = ReadOutput::default();
    futures::pin_mut!(pages);
    while let Some(page) = pages.try_next().await? {
        output.pages += 1;
        output.items.extend(page.items);
    }
    Ok(output)
}
