//! drive-query CLI
//!
//! Read drive logs from a DynamoDB table, following every continuation token.

use clap::{Parser, ValueEnum};
use drive_data::read::common::{Page, ReadArgs};
use drive_data::{cli, common, config::ClientConfig, error::Error, read};
use futures::{Stream, TryStreamExt};
use serde_json::Value;
use std::process::ExitCode;

/// Query or scan a DynamoDB table of drive logs.
///
/// ## Examples
///
/// Every log of one drive:
///   drive-query --table honda-hackathon1 --partition-key 20181120104743
///
/// A single log line:
///   drive-query --table honda-hackathon1 --partition-key 20181120104743 --sort-key 1376395
///
/// Only GPS attributes, printed as JSON lines:
///   drive-query --table honda-hackathon1 --partition-key 20181120104743 \
///       --projection logtime,latitude,longitude --print-items
#[derive(Parser, Debug)]
#[command(name = "drive-query")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Table name
    #[arg(short, long)]
    table: String,

    /// Partition key value
    #[arg(short, long, required_unless_present = "scan")]
    partition_key: Option<String>,

    /// Sort key value, for a point lookup
    #[arg(short, long, conflicts_with = "scan")]
    sort_key: Option<String>,

    /// Partition key attribute name
    #[arg(long, default_value = "driveid")]
    partition_key_name: String,

    /// Sort key attribute name
    #[arg(long, default_value = "logtime")]
    sort_key_name: String,

    /// Type of the key values
    #[arg(long, value_enum, default_value = "number")]
    key_type: KeyType,

    /// Attributes to return, comma separated
    #[arg(long, value_delimiter = ',')]
    projection: Vec<String>,

    /// Secondary index to read from
    #[arg(long)]
    index: Option<String>,

    /// Maximum number of items per page
    #[arg(long, value_parser = clap::value_parser!(i32).range(1..))]
    limit: Option<i32>,

    /// Use strongly consistent reads
    #[arg(long)]
    consistent_read: bool,

    /// Return items in descending sort key order
    #[arg(long, conflicts_with = "scan")]
    descending: bool,

    /// Scan the whole table instead of querying one partition
    #[arg(long)]
    scan: bool,

    /// Print every item as a JSON line
    #[arg(long)]
    print_items: bool,

    #[command(flatten)]
    aws: cli::AwsArgs,
}

/// Key value type.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum KeyType {
    /// Integer keys in the 64-bit range (DynamoDB `N`)
    Number,
    /// String keys (DynamoDB `S`)
    String,
}

impl KeyType {
    fn parse(self, raw: &str) -> Result<Value, Error> {
        match self {
            Self::Number => raw
                .parse::<u64>()
                .map(Value::from)
                .or_else(|_| raw.parse::<i64>().map(Value::from))
                .map_err(|_| Error::InvalidRequest {
                    message: format!("'{raw}' is not an integer key in the 64-bit range"),
                }),
            Self::String => Ok(Value::String(raw.to_string())),
        }
    }
}

/// Totals of a drained page stream.
#[derive(Debug, Default)]
struct Totals {
    items: usize,
    pages: usize,
}

async fn drain(
    pages: impl Stream<Item = Result<Page, Error>>,
    print_items: bool,
) -> Result<Totals, Error> {
    let mut totals = Totals::default();
    futures::pin_mut!(pages);
    while let Some(page) = pages.try_next().await? {
        totals.pages += 1;
        totals.items += page.items.len();
        if print_items {
            for item in page.items {
                let value: Value =
                    serde_dynamo::from_item(item).map_err(|error| Error::Decode {
                        message: error.to_string(),
                    })?;
                println!("{value}");
            }
        }
    }
    Ok(totals)
}

async fn run(args: Cli) -> Result<(), Error> {
    let client = ClientConfig::from(&args.aws).dynamodb_client().await;
    let read_args = ReadArgs {
        consistent_read: args.consistent_read.then_some(true),
        index_name: args.index.clone(),
        limit: args.limit,
        selection: (!args.projection.is_empty())
            .then(|| common::selection::SelectionMap::from_attributes(&args.projection)),
        table_name: args.table.clone(),
        ..Default::default()
    };

    let Some(partition_key) = args.partition_key.as_deref().filter(|_| !args.scan) else {
        let scan: read::scan::Scan<Value> = read::scan::Scan {
            read_args,
            ..Default::default()
        };
        let totals = drain(scan.pages(&client), args.print_items).await?;
        println!(
            "Scanned {} logs from table {} in {} pages",
            totals.items, args.table, totals.pages
        );
        return Ok(());
    };

    let sort_key_condition = match &args.sort_key {
        Some(sort_key) => Some(common::condition::KeyCondition::equals(
            &args.sort_key_name,
            args.key_type.parse(sort_key)?,
        )),
        None => None,
    };
    let query = read::query::Query {
        partition_key: common::key::Key::new(
            &args.partition_key_name,
            args.key_type.parse(partition_key)?,
        ),
        read_args,
        scan_index_forward: args.descending.then_some(false),
        sort_key_condition,
    };
    let totals = drain(query.pages(&client), args.print_items).await?;
    match &args.sort_key {
        Some(sort_key) => println!(
            "Retrieved {} logs for partition {partition_key} at {} {sort_key}",
            totals.items, args.sort_key_name
        ),
        None => println!(
            "Retrieved {} logs for partition {partition_key} in {} pages",
            totals.items, totals.pages
        ),
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Cli::parse();

    cli::init_logging(args.aws.log_level)?;

    match run(args).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(error) => Ok(cli::report_error(&error)),
    }
}
