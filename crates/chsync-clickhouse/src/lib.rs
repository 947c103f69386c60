//! ClickHouse sink adapter for chsync
//!
//! Wraps the `clickhouse` HTTP client for everything the replicators write:
//! database/DDL execution, existence and count checks, and batched
//! positional inserts rendered as escaped `VALUES` literals.

use chsync_core::SyncError;

mod literal;
pub mod sink;

pub use sink::ClickHouseSink;

/// Sink failures are never recovered in place; the event loop treats them
/// as fatal.
pub(crate) fn ch_err(error: clickhouse::error::Error) -> SyncError {
    SyncError::Database(error.to_string())
}
