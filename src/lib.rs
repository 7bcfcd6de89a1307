#![deny(missing_docs)]

//! # Drive Data
//!
//! Fetch drive recordings from Amazon S3 and read drive logs from Amazon DynamoDB.
//!
//! ## Overview
//!
//! The crate has two halves that share one error type and one client configuration:
//! - [`mod@fetch`] streams an S3 object to a local file in bounded chunks. It writes
//!   through a staging file, so a failed download never leaves a partial file behind.
//! - [`mod@read`] runs DynamoDB queries and scans as lazy page streams. It follows
//!   continuation tokens until the service stops returning one.
//!
//! Both take their AWS client as an argument through a small trait
//! ([`fetch::ObjectSource`], [`read::common::PageSource`]), so the same code runs
//! against the real SDK clients or an in-memory source.
//!
//! ## Quick Example
//!
//! ```no_run
//! use drive_data::{common, config, read};
//! use serde_json::Value;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = config::ClientConfig::default()
//!     .with_region("us-east-1")
//!     .dynamodb_client()
//!     .await;
//! let query = read::query::Query {
//!     partition_key: common::key::Key::new("driveid", Value::from(20181120104743_u64)),
//!     read_args: read::common::ReadArgs {
//!         selection: Some(common::selection::SelectionMap::from_attributes([
//!             "logtime", "latitude", "longitude",
//!         ])),
//!         table_name: "honda-hackathon1".to_string(),
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! };
//! // Key condition "#driveid = :driveid_eq0", projection "#logtime, #latitude, #longitude"
//! let output = query.send(&client).await?;
//! println!("Retrieved {} logs in {} pages", output.count(), output.pages);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`mod@common`] - Keys, key conditions and attribute selection
//! - [`mod@config`] - Region, credentials and endpoint for the SDK clients
//! - [`mod@error`] - Error type shared by every operation
//! - [`mod@fetch`] - S3 object download
//! - [`mod@read`] - Paginated Query and Scan

/// Command line helpers shared by the binaries.
#[cfg(feature = "cli")]
pub mod cli;

/// Common utilities for keys, conditions, and attribute selection.
pub mod common;

/// Client configuration.
pub mod config;

/// Errors and their classification.
pub mod error;

/// Object download to local files.
pub mod fetch;

/// Read operations for retrieving data from DynamoDB tables.
///
/// This module provides operations for:
/// - Querying items of one partition with key conditions
/// - Scanning entire tables
pub mod read;
