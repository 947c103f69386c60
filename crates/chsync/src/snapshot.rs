//! Snapshot replication: one-shot bulk copy of whole tables
//!
//! Each table runs the same pipeline end-to-end: ensure the target schema,
//! stream the source rows in batches, insert them, then compare row counts.
//! Tables are independent, so with `parallel_tables > 1` up to that many
//! pipelines run concurrently; a failure in one table is captured into its
//! result and does not cancel the others.

use futures::StreamExt;
use serde::Serialize;
use tracing::{error, info};

use chsync_core::{ddl, validate_identifier, Result, SinkAdapter, SourceAdapter, TableSchema};
use chsync_shared::ReplicationSettings;

/// Outcome of replicating one table.
#[derive(Debug, Clone, Serialize)]
pub struct TableResult {
    pub table: String,
    pub source_rows: u64,
    pub rows_inserted: u64,
    pub target_rows: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TableResult {
    fn failed(table: &str, error: String) -> Self {
        Self {
            table: table.to_string(),
            source_rows: 0,
            rows_inserted: 0,
            target_rows: 0,
            success: false,
            error: Some(error),
        }
    }
}

/// Whether a whole snapshot run succeeded; drives the process exit code.
pub fn all_succeeded(results: &[TableResult]) -> bool {
    results.iter().all(|result| result.success)
}

pub struct SnapshotReplicator<'a, S, K> {
    source: &'a S,
    sink: &'a K,
    database: String,
    settings: ReplicationSettings,
}

impl<'a, S: SourceAdapter, K: SinkAdapter> SnapshotReplicator<'a, S, K> {
    pub fn new(
        source: &'a S,
        sink: &'a K,
        target_database: impl Into<String>,
        settings: ReplicationSettings,
    ) -> Self {
        Self {
            source,
            sink,
            database: target_database.into(),
            settings,
        }
    }

    /// Replicate the configured table set, sequentially or on a bounded
    /// pool. Results come back in completion order.
    pub async fn run(&self) -> Result<Vec<TableResult>> {
        info!(
            parallel_tables = self.settings.parallel_tables,
            "Starting replication process"
        );

        self.sink.create_database().await?;

        let tables = self.tables_to_replicate().await?;
        info!(count = tables.len(), ?tables, "Tables to replicate");

        let results = if self.settings.parallel_tables <= 1 {
            let mut results = Vec::with_capacity(tables.len());
            for table in &tables {
                results.push(self.replicate_table_captured(table).await);
            }
            results
        } else {
            futures::stream::iter(tables.iter())
                .map(|table| self.replicate_table_captured(table))
                .buffer_unordered(self.settings.parallel_tables)
                .collect()
                .await
        };

        let successful = results.iter().filter(|r| r.success).count();
        info!(
            total_tables = results.len(),
            successful,
            failed = results.len() - successful,
            "Replication completed"
        );

        Ok(results)
    }

    async fn tables_to_replicate(&self) -> Result<Vec<String>> {
        let configured = self.settings.tables_list();
        if !configured.is_empty() {
            return Ok(configured);
        }
        self.source.list_tables().await
    }

    /// The single-table pipeline with its error captured into the result
    /// record, so one bad table never cancels the rest of the run.
    async fn replicate_table_captured(&self, table: &str) -> TableResult {
        match self.replicate_table(table).await {
            Ok(result) => result,
            Err(err) => {
                error!(table, error = %err, "Failed to replicate table");
                TableResult::failed(table, err.to_string())
            }
        }
    }

    pub async fn replicate_table(&self, table: &str) -> Result<TableResult> {
        info!(table, "Starting table replication");

        let schema = self.source.table_schema(table).await?;
        let source_rows = self.source.row_count(table).await?;

        self.replicate_schema(&schema).await?;
        let rows_inserted = self.replicate_data(&schema).await?;

        let target_rows = self.sink.row_count(table).await?;

        let result = TableResult {
            table: table.to_string(),
            source_rows,
            rows_inserted,
            target_rows,
            success: source_rows == target_rows,
            error: None,
        };

        info!(
            table,
            source_rows,
            rows_inserted,
            target_rows,
            success = result.success,
            "Table replication completed"
        );
        Ok(result)
    }

    async fn replicate_schema(&self, schema: &TableSchema) -> Result<()> {
        validate_identifier(&schema.name, "table name")?;
        for column in &schema.columns {
            validate_identifier(&column.name, "column name")?;
        }

        if self.settings.drop_existing {
            self.sink
                .execute(&ddl::drop_table(&schema.name, &self.database))
                .await?;
            info!(table = %schema.name, "Dropped existing table");
        }

        self.sink
            .execute(&ddl::create_table(schema, &self.database))
            .await?;
        info!(table = %schema.name, "Created table schema");
        Ok(())
    }

    async fn replicate_data(&self, schema: &TableSchema) -> Result<u64> {
        let columns = schema.column_names();
        let mut batches = self
            .source
            .stream_batches(&schema.name, &columns, self.settings.batch_size)
            .await?;

        let mut total_rows = 0u64;
        let mut batch_count = 0u64;

        while let Some(batch) = batches.next().await {
            let inserted = self.sink.insert(&schema.name, &columns, batch?).await?;
            total_rows += inserted as u64;
            batch_count += 1;

            if batch_count % 10 == 0 {
                info!(table = %schema.name, rows = total_rows, "Replication progress");
            }
        }

        Ok(total_rows)
    }
}
