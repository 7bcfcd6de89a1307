//! Paginated reads from DynamoDB tables.
//!
//! Queries and scans share one pagination loop: request a page, hand it to the caller,
//! and continue only while the service returns a continuation token.

/// Pages, the page source seam and arguments shared by queries and scans.
pub mod common;

/// Key condition queries.
pub mod query;

/// Full table scans.
pub mod scan;
