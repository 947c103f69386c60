//! Error types for chsync

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("empty {context} is not allowed")]
    EmptyIdentifier { context: &'static str },

    #[error("invalid {context} '{name}': must contain only alphanumeric characters and underscores, and start with a letter or underscore")]
    InvalidIdentifier { context: &'static str, name: String },

    #[error("not connected to {0}")]
    NotConnected(&'static str),

    #[error("cannot determine binlog position; is the binary log enabled?")]
    BinlogDisabled,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("binlog decode error: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Whether the CDC loop may recover from this error by reconnecting.
    ///
    /// Connection resets, timeouts and OS-level I/O failures are transient;
    /// everything else terminates the process.
    pub fn is_transport(&self) -> bool {
        matches!(self, SyncError::Transport(_) | SyncError::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        assert!(SyncError::Transport("connection reset".into()).is_transport());
        assert!(SyncError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe")).is_transport());
        assert!(!SyncError::Database("syntax error".into()).is_transport());
        assert!(!SyncError::BinlogDisabled.is_transport());
    }
}
