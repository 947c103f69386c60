//! Mock adapters and fixtures shared by the replicator tests.

use async_trait::async_trait;
use futures::StreamExt;
use mockall::mock;

use chsync_core::adapter::{BatchStream, ChangeStream, SinkAdapter, SourceAdapter};
use chsync_core::{
    BinlogPosition, ChangeEvent, ColumnInfo, KeyRole, Result, RowBatch, TableSchema,
};
use chsync_shared::{ReplicationMode, ReplicationSettings};

mock! {
    pub Source {}

    #[async_trait]
    impl SourceAdapter for Source {
        async fn list_tables(&self) -> Result<Vec<String>>;
        async fn table_schema(&self, table: &str) -> Result<TableSchema>;
        async fn row_count(&self, table: &str) -> Result<u64>;
        async fn stream_batches(
            &self,
            table: &str,
            columns: &[String],
            batch_size: usize,
        ) -> Result<BatchStream>;
        async fn current_log_position(&self) -> Result<BinlogPosition>;
        async fn open_binlog_stream(
            &self,
            from: Option<BinlogPosition>,
            tables: &[String],
        ) -> Result<ChangeStream>;
    }
}

mock! {
    pub Sink {}

    #[async_trait]
    impl SinkAdapter for Sink {
        async fn create_database(&self) -> Result<()>;
        async fn execute(&self, sql: &str) -> Result<()>;
        async fn table_exists(&self, table: &str) -> Result<bool>;
        async fn row_count(&self, table: &str) -> Result<u64>;
        async fn insert(&self, table: &str, columns: &[String], rows: RowBatch) -> Result<usize>;
        async fn truncate(&self, table: &str) -> Result<()>;
    }
}

pub(crate) fn users_schema() -> TableSchema {
    TableSchema::new(
        "users",
        vec![
            ColumnInfo::new("id", "int").key(KeyRole::Primary),
            ColumnInfo::new("email", "varchar"),
        ],
    )
}

pub(crate) fn settings_for(tables: &str) -> ReplicationSettings {
    ReplicationSettings {
        mode: ReplicationMode::Snapshot,
        batch_size: 1000,
        tables: tables.to_string(),
        drop_existing: false,
        parallel_tables: 1,
        position_file: std::env::temp_dir().join("chsync-test-position.json"),
    }
}

pub(crate) fn batch_stream(batches: Vec<RowBatch>) -> BatchStream {
    futures::stream::iter(batches.into_iter().map(Ok)).boxed()
}

pub(crate) fn change_stream(items: Vec<Result<ChangeEvent>>) -> ChangeStream {
    futures::stream::iter(items).boxed()
}
