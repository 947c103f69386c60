//! Binlog position tracking and the durable checkpoint file

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;

/// A resume coordinate in the source's binary log.
///
/// `(file, position)` addresses the log; `timestamp` (Unix seconds) is
/// advisory only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinlogPosition {
    pub file: String,
    pub position: u64,
    #[serde(default)]
    pub timestamp: f64,
}

impl BinlogPosition {
    pub fn new(file: impl Into<String>, position: u64) -> Self {
        Self {
            file: file.into(),
            position,
            timestamp: Utc::now().timestamp_micros() as f64 / 1_000_000.0,
        }
    }
}

/// Durable store for the single checkpointed binlog position.
///
/// The file is a small JSON document rewritten in place; the at-least-once
/// contract tolerates a torn write, which simply replays from an older
/// position.
#[derive(Debug, Clone)]
pub struct PositionStore {
    path: PathBuf,
}

impl PositionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the checkpoint. A missing or malformed file is treated as "no
    /// checkpoint" and triggers a fresh initial sync.
    pub fn load(&self) -> Option<BinlogPosition> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(_) => return None,
        };

        match serde_json::from_str::<BinlogPosition>(&data) {
            Ok(pos) => {
                info!(file = %pos.file, position = pos.position, "Loaded binlog position");
                Some(pos)
            }
            Err(error) => {
                warn!(path = %self.path.display(), %error, "Failed to parse position file");
                None
            }
        }
    }

    pub fn save(&self, position: &BinlogPosition) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string(position)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = PositionStore::new(dir.path().join("position.json"));

        assert!(store.load().is_none());

        let pos = BinlogPosition::new("binlog.000042", 1234);
        store.save(&pos).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.file, "binlog.000042");
        assert_eq!(loaded.position, 1234);
        assert!(loaded.timestamp > 0.0);
    }

    #[test]
    fn test_malformed_file_is_no_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("position.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(PositionStore::new(&path).load().is_none());
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = PositionStore::new(dir.path().join("nested/state/position.json"));

        store.save(&BinlogPosition::new("binlog.000001", 4)).unwrap();
        assert!(store.load().is_some());
    }

    #[test]
    fn test_json_document_shape() {
        let pos = BinlogPosition {
            file: "bin.000123".to_string(),
            position: 4567,
            timestamp: 1700000000.5,
        };

        let json: serde_json::Value = serde_json::from_str(&serde_json::to_string(&pos).unwrap()).unwrap();
        assert_eq!(json["file"], "bin.000123");
        assert_eq!(json["position"], 4567);
        assert_eq!(json["timestamp"], 1700000000.5);
    }
}
