//! Shared utilities for chsync: configuration loading, logging setup and
//! the reconnect backoff policy.

pub mod backoff;
pub mod config;
pub mod observability;

pub use backoff::Backoff;
pub use config::{
    ClickHouseSettings, MySqlSettings, ReplicationMode, ReplicationSettings, Settings,
};
pub use observability::init_logging;
