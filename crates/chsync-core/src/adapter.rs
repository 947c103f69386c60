//! Adapter traits for the source and sink databases
//!
//! The replicators are generic over these seams; the driver crates provide
//! the MySQL and ClickHouse implementations, and tests substitute mocks.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::event::ChangeEvent;
use crate::position::BinlogPosition;
use crate::schema::TableSchema;
use crate::value::{RowBatch, RowTuple};

/// Lazily produced batches of row tuples from a streaming table scan.
pub type BatchStream = BoxStream<'static, Result<Vec<RowTuple>>>;

/// Decoded row events from the source's binary log.
pub type ChangeStream = BoxStream<'static, Result<ChangeEvent>>;

/// Read side: table discovery, metadata, streaming reads and the binlog.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// All base-table names in the configured schema.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Column metadata for one table, in ordinal position order.
    async fn table_schema(&self, table: &str) -> Result<TableSchema>;

    async fn row_count(&self, table: &str) -> Result<u64>;

    /// Stream the whole table in batches of `batch_size`, each row
    /// projected in the caller-supplied column order. The final batch may
    /// be partial. The full result set is never buffered client-side.
    async fn stream_batches(
        &self,
        table: &str,
        columns: &[String],
        batch_size: usize,
    ) -> Result<BatchStream>;

    /// The server's current binlog position (`SHOW MASTER STATUS`).
    async fn current_log_position(&self) -> Result<BinlogPosition>;

    /// Open a row-event stream over the binlog, restricted to the
    /// configured schema and the given tables. Resumes from `from` when
    /// supplied, otherwise starts at the server's current position.
    async fn open_binlog_stream(
        &self,
        from: Option<BinlogPosition>,
        tables: &[String],
    ) -> Result<ChangeStream>;
}

/// Write side: DDL execution and batched positional inserts.
#[async_trait]
pub trait SinkAdapter: Send + Sync {
    /// Create the configured database if it does not exist.
    async fn create_database(&self) -> Result<()>;

    /// Raw DDL passthrough.
    async fn execute(&self, sql: &str) -> Result<()>;

    async fn table_exists(&self, table: &str) -> Result<bool>;

    async fn row_count(&self, table: &str) -> Result<u64>;

    /// Insert tuples whose values align positionally with `columns`.
    /// Returns the number of rows submitted; empty input is a no-op
    /// returning 0.
    async fn insert(&self, table: &str, columns: &[String], rows: RowBatch) -> Result<usize>;

    async fn truncate(&self, table: &str) -> Result<()>;
}
