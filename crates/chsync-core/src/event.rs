//! Decoded binlog row events

use crate::position::BinlogPosition;
use crate::value::RowBatch;

/// Row-event flavor, matching the binlog's Write/Update/DeleteRows events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }
}

/// One decoded row event for a single table.
///
/// `rows` holds positional tuples in the table's declared column order.
/// For updates these are the after-images; the before-image is dropped at
/// decode time. `position` is the stream position reached after this
/// event and is what checkpointing persists.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
    pub rows: RowBatch,
    pub position: BinlogPosition,
}

impl ChangeEvent {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::SqlValue;

    #[test]
    fn test_change_kind_as_str() {
        assert_eq!(ChangeKind::Insert.as_str(), "insert");
        assert_eq!(ChangeKind::Update.as_str(), "update");
        assert_eq!(ChangeKind::Delete.as_str(), "delete");
    }

    #[test]
    fn test_row_count() {
        let event = ChangeEvent {
            table: "users".to_string(),
            kind: ChangeKind::Insert,
            rows: vec![vec![SqlValue::Int(1)], vec![SqlValue::Int(2)]],
            position: BinlogPosition::new("binlog.000001", 4),
        };
        assert_eq!(event.row_count(), 2);
    }
}
