//! drive-fetch CLI
//!
//! Download one drive recording from S3 to a local file.

use clap::Parser;
use drive_data::{cli, config::ClientConfig, error::Error, fetch};
use std::{path::PathBuf, process::ExitCode};

/// Download an S3 object to a local file.
///
/// The object is written to `<dest>.part` first and renamed once complete.
///
/// ## Examples
///
///   drive-fetch --bucket p3na-18gus.3101.027 \
///       --key "video-files/Recfile P3 Edge 20181120 104743 Webcam Driver Outputiplimage.m4v" \
///       --dest driver.m4v
#[derive(Parser, Debug)]
#[command(name = "drive-fetch")]
#[command(version, about, long_about = None)]
struct Cli {
    /// S3 bucket name
    #[arg(short, long)]
    bucket: String,

    /// Object key
    #[arg(short, long)]
    key: String,

    /// Destination file
    #[arg(short, long)]
    dest: PathBuf,

    /// Copy buffer size in bytes (must be >= 1)
    #[arg(long, default_value_t = fetch::DEFAULT_CHUNK_SIZE, value_parser = parse_chunk_size)]
    chunk_size: usize,

    /// Skip checksum validation of the downloaded body
    #[arg(long)]
    no_verify_checksum: bool,

    #[command(flatten)]
    aws: cli::AwsArgs,
}

/// Parse a positive chunk size.
fn parse_chunk_size(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if value < 1 {
        return Err(format!("{value} is not in 1.."));
    }
    Ok(value)
}

async fn run(args: Cli) -> Result<(), Error> {
    let client = ClientConfig::from(&args.aws).s3_client().await;
    let fetch_object = fetch::FetchObject {
        object: fetch::ObjectRef::new(args.bucket, args.key),
        destination: args.dest,
        options: fetch::FetchOptions {
            chunk_size: args.chunk_size,
            verify_checksum: !args.no_verify_checksum,
        },
    };
    println!(
        "Downloading s3://{}/{} to {}",
        fetch_object.object.bucket,
        fetch_object.object.key,
        fetch_object.destination.display()
    );
    let outcome = fetch_object.send(&client).await?;
    println!(
        "Wrote {} to {}",
        cli::format_bytes(outcome.bytes),
        outcome.path.display()
    );
    if let Some(e_tag) = &outcome.e_tag {
        println!("  ETag: {e_tag}");
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
