//! MySQL source adapter for chsync
//!
//! Wraps `mysql_async` for everything the replicators need from the source:
//! table discovery, column metadata, streaming table scans, the current
//! binlog coordinates and a decoded row-event stream over the replication
//! protocol.

use chsync_core::SyncError;

pub mod source;
pub mod stream;
mod value;

pub use source::MySqlSource;

/// Classify a driver error for the reconnect logic: network-level failures
/// are transient, everything else (server errors, protocol errors, bad
/// URLs) is fatal.
pub(crate) fn mysql_err(error: mysql_async::Error) -> SyncError {
    if matches!(error, mysql_async::Error::Io(_)) {
        SyncError::Transport(error.to_string())
    } else {
        SyncError::Database(error.to_string())
    }
}
