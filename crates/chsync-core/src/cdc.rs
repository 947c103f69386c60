//! CDC row shape
//!
//! Every replicated row is the source tuple extended with two trailing
//! columns: `_version` (microsecond timestamp, the ReplacingMergeTree
//! version) and `_deleted` (soft-delete flag).

use chrono::Utc;

use crate::value::{RowTuple, SqlValue};

pub const VERSION_COLUMN: &str = "_version";
pub const DELETED_COLUMN: &str = "_deleted";

/// The sink-side column list for a CDC table: the cached source columns
/// plus the two CDC columns, in that order.
pub fn cdc_columns(columns: &[String]) -> Vec<String> {
    let mut all = columns.to_vec();
    all.push(VERSION_COLUMN.to_string());
    all.push(DELETED_COLUMN.to_string());
    all
}

/// Append `(_version, _deleted)` to a source row tuple.
pub fn extend_row(mut row: RowTuple, version: u64, deleted: bool) -> RowTuple {
    row.push(SqlValue::UInt(version));
    row.push(SqlValue::UInt(u64::from(deleted)));
    row
}

/// Microsecond version timestamps, monotonically non-decreasing within the
/// process. A backward clock step is clamped to the last value issued;
/// equal versions are resolved by the target engine's insertion-order
/// tie-break, which is safe because replayed payloads are identical.
#[derive(Debug, Default)]
pub struct VersionClock {
    last: u64,
}

impl VersionClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self) -> u64 {
        let now = Utc::now().timestamp_micros().max(0) as u64;
        self.last = now.max(self.last);
        self.last
    }
}
