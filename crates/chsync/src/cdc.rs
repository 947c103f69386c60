//! CDC replication over the MySQL binlog
//!
//! Changes land in ClickHouse `ReplacingMergeTree(_version)` tables:
//! inserts and updates write the row with `_deleted = 0`, deletes write it
//! with `_deleted = 1`, and the engine collapses duplicate keys to the
//! highest version. A first run captures the binlog position, snapshots
//! every table with CDC columns and checkpoints that position; restarts
//! resume the stream from the checkpoint and replay over the existing
//! data, which the versioning makes idempotent.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tracing::{debug, info, warn};

use chsync_core::adapter::ChangeStream;
use chsync_core::cdc::{cdc_columns, extend_row, VersionClock};
use chsync_core::{
    ddl, validate_identifier, BinlogPosition, ChangeEvent, ChangeKind, PositionStore, Result,
    SinkAdapter, SourceAdapter, SyncError,
};
use chsync_shared::{Backoff, ReplicationSettings};

const CHECKPOINT_INTERVAL: Duration = Duration::from_secs(5);
const INITIAL_RECONNECT_DELAY: Duration = Duration::from_secs(1);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

pub struct CdcReplicator<'a, S, K> {
    source: &'a S,
    sink: &'a K,
    database: String,
    settings: ReplicationSettings,
    positions: PositionStore,
    tables: Vec<String>,
    /// Column order per table, captured when the target table was created
    /// (or primed on restart). Event tuples are mapped against this order.
    columns: HashMap<String, Vec<String>>,
    clock: VersionClock,
}

impl<'a, S: SourceAdapter, K: SinkAdapter> CdcReplicator<'a, S, K> {
    pub fn new(
        source: &'a S,
        sink: &'a K,
        target_database: impl Into<String>,
        settings: ReplicationSettings,
    ) -> Self {
        let positions = PositionStore::new(settings.position_file.clone());

        Self {
            source,
            sink,
            database: target_database.into(),
            settings,
            positions,
            tables: Vec::new(),
            columns: HashMap::new(),
            clock: VersionClock::new(),
        }
    }

    /// Run CDC replication until shutdown or a fatal error.
    pub async fn run(&mut self) -> Result<()> {
        info!("Starting CDC replication");

        let mut position = self.bootstrap().await?;
        let mut events_processed = 0u64;
        let mut backoff = Backoff::new(INITIAL_RECONNECT_DELAY, MAX_RECONNECT_DELAY);

        loop {
            let mut stream = self
                .source
                .open_binlog_stream(Some(position.clone()), &self.tables)
                .await?;
            info!(file = %position.file, position = position.position, "Starting binlog stream");

            let outcome = self
                .stream_events(&mut stream, &mut position, &mut events_processed)
                .await;
            drop(stream);

            // Best-effort: persist the last known position on every exit
            // path before deciding what to do next.
            if let Err(error) = self.positions.save(&position) {
                warn!(%error, "Failed to persist binlog position during cleanup");
            }

            match outcome {
                Ok(()) => {
                    info!(
                        events_processed,
                        final_position = position.position,
                        "CDC stopped"
                    );
                    return Ok(());
                }
                Err(error) if error.is_transport() => {
                    let delay = backoff.next_delay();
                    warn!(
                        %error,
                        reconnect_delay_seconds = delay.as_secs(),
                        "Binlog stream disconnected; will reconnect"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Resolve the table set and the starting position: resume from the
    /// checkpoint when one exists, otherwise run the initial sync.
    async fn bootstrap(&mut self) -> Result<BinlogPosition> {
        self.tables = self.replicated_tables().await?;

        match self.positions.load() {
            Some(position) => {
                self.prime_schema_cache().await?;
                Ok(position)
            }
            None => self.initial_sync().await,
        }
    }

    async fn replicated_tables(&self) -> Result<Vec<String>> {
        let configured = self.settings.tables_list();
        if !configured.is_empty() {
            return Ok(configured);
        }
        self.source.list_tables().await
    }

    /// Full sync before streaming starts. The binlog position is captured
    /// *before* any data is read, so every change at or after it replays
    /// over the snapshot; the version column makes that replay a no-op.
    async fn initial_sync(&mut self) -> Result<BinlogPosition> {
        info!("Starting initial sync");

        let position = self.source.current_log_position().await?;
        info!(
            file = %position.file,
            position = position.position,
            "Captured binlog position for CDC"
        );

        self.ensure_cdc_schema().await?;

        let tables = self.tables.clone();
        for table in &tables {
            self.sync_table(table).await?;
        }

        self.positions.save(&position)?;
        info!("Initial sync completed");
        Ok(position)
    }

    /// Create CDC-shaped target tables (and their `_live` views), caching
    /// each table's column order for event processing.
    async fn ensure_cdc_schema(&mut self) -> Result<()> {
        self.sink.create_database().await?;

        let tables = self.tables.clone();
        for table in &tables {
            let schema = self.source.table_schema(table).await?;
            validate_identifier(&schema.name, "table name")?;
            for column in &schema.columns {
                validate_identifier(&column.name, "column name")?;
            }

            self.columns.insert(table.clone(), schema.column_names());

            if self.settings.drop_existing {
                self.sink
                    .execute(&ddl::drop_table(&schema.name, &self.database))
                    .await?;
            }

            self.sink
                .execute(&ddl::create_cdc_table(&schema, &self.database))
                .await?;
            self.sink
                .execute(&ddl::create_cdc_view(&schema.name, &self.database, &schema))
                .await?;
            info!(table, "Created CDC table");
        }

        Ok(())
    }

    /// Copy one table's current contents, each row extended with
    /// `(_version, _deleted = 0)`.
    async fn sync_table(&mut self, table: &str) -> Result<()> {
        let columns = self.table_columns(table).await?;
        let all_columns = cdc_columns(&columns);
        let version = self.clock.next();

        let mut batches = self
            .source
            .stream_batches(table, &columns, self.settings.batch_size)
            .await?;

        let mut total_rows = 0usize;
        while let Some(batch) = batches.next().await {
            let rows = batch?
                .into_iter()
                .map(|row| extend_row(row, version, false))
                .collect();
            total_rows += self.sink.insert(table, &all_columns, rows).await?;
        }

        info!(table, rows = total_rows, "Synced table");
        Ok(())
    }

    /// On restart the target tables already exist; only the column order
    /// must be re-read so event handlers can map decoded rows.
    async fn prime_schema_cache(&mut self) -> Result<()> {
        let tables = self.tables.clone();
        for table in &tables {
            if !self.columns.contains_key(table) {
                let schema = self.source.table_schema(table).await?;
                self.columns.insert(table.clone(), schema.column_names());
            }
        }

        info!(count = self.columns.len(), "Loaded table schemas");
        Ok(())
    }

    async fn table_columns(&mut self, table: &str) -> Result<Vec<String>> {
        if let Some(columns) = self.columns.get(table) {
            return Ok(columns.clone());
        }

        let schema = self.source.table_schema(table).await?;
        let columns = schema.column_names();
        self.columns.insert(table.to_string(), columns.clone());
        Ok(columns)
    }

    /// The single-threaded event loop: decode, transform, insert,
    /// checkpoint. Returns `Ok(())` only on user shutdown; stream errors
    /// bubble up for classification by the caller.
    async fn stream_events(
        &mut self,
        stream: &mut ChangeStream,
        position: &mut BinlogPosition,
        events_processed: &mut u64,
    ) -> Result<()> {
        let interrupt = tokio::signal::ctrl_c();
        tokio::pin!(interrupt);

        let mut last_save = Instant::now();

        loop {
            tokio::select! {
                _ = &mut interrupt => {
                    info!("CDC stopped by user");
                    return Ok(());
                }
                next = stream.next() => {
                    let event = match next {
                        Some(Ok(event)) => event,
                        Some(Err(error)) => return Err(error),
                        None => return Err(SyncError::Transport("binlog stream ended".to_string())),
                    };

                    if !self.tables.contains(&event.table) {
                        continue;
                    }

                    let rows = self.apply_event(&event).await?;
                    debug!(table = %event.table, kind = event.kind.as_str(), rows, "Applied row event");

                    *position = event.position.clone();
                    *events_processed += 1;

                    if last_save.elapsed() >= CHECKPOINT_INTERVAL {
                        self.positions.save(position)?;
                        last_save = Instant::now();

                        if *events_processed % 100 == 0 {
                            info!(
                                events = *events_processed,
                                binlog_file = %position.file,
                                binlog_pos = position.position,
                                "CDC progress"
                            );
                        }
                    }
                }
            }
        }
    }

    /// Materialize one row event as a single batched insert: the decoded
    /// tuples in cached column order, extended with the version timestamp
    /// and the delete flag.
    async fn apply_event(&mut self, event: &ChangeEvent) -> Result<usize> {
        if event.rows.is_empty() {
            return Ok(0);
        }

        let columns = self.table_columns(&event.table).await?;
        for row in &event.rows {
            if row.len() != columns.len() {
                return Err(SyncError::Database(format!(
                    "row for `{}` has {} values but {} columns are cached; \
                     the table was altered after startup",
                    event.table,
                    row.len(),
                    columns.len()
                )));
            }
        }

        let version = self.clock.next();
        let deleted = event.kind == ChangeKind::Delete;
        let rows = event
            .rows
            .iter()
            .cloned()
            .map(|row| extend_row(row, version, deleted))
            .collect();

        self.sink
            .insert(&event.table, &cdc_columns(&columns), rows)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        batch_stream, change_stream, settings_for, users_schema, MockSink, MockSource,
    };
    use chsync_core::SqlValue;

    fn cdc_settings(dir: &tempfile::TempDir, tables: &str) -> ReplicationSettings {
        let mut settings = settings_for(tables);
        settings.position_file = dir.path().join("binlog_position.json");
        settings
    }

    fn write_checkpoint(settings: &ReplicationSettings, file: &str, position: u64) {
        std::fs::write(
            &settings.position_file,
            serde_json::json!({ "file": file, "position": position, "timestamp": 0.0 }).to_string(),
        )
        .unwrap();
    }

    fn insert_event(table: &str, rows: Vec<Vec<SqlValue>>, file: &str, position: u64) -> ChangeEvent {
        ChangeEvent {
            table: table.to_string(),
            kind: ChangeKind::Insert,
            rows,
            position: BinlogPosition {
                file: file.to_string(),
                position,
                timestamp: 0.0,
            },
        }
    }

    #[tokio::test]
    async fn test_resume_skips_initial_sync_and_primes_schema_cache() {
        let dir = tempfile::tempdir().unwrap();
        let settings = cdc_settings(&dir, "users");
        write_checkpoint(&settings, "bin.000123", 4567);

        let mut source = MockSource::new();
        let sink = MockSink::new();

        // No current_log_position, no stream_batches: the sync is skipped.
        source
            .expect_table_schema()
            .times(1)
            .returning(|_| Ok(users_schema()));
        source
            .expect_open_binlog_stream()
            .withf(|from, tables| {
                from.as_ref()
                    .is_some_and(|p| p.file == "bin.000123" && p.position == 4567)
                    && tables == ["users"]
            })
            .times(1)
            .returning(|_, _| {
                Ok(change_stream(vec![Err(SyncError::Database(
                    "stop the test".into(),
                ))]))
            });

        let mut replicator = CdcReplicator::new(&source, &sink, "analytics", settings);
        let error = replicator.run().await.unwrap_err();
        assert!(!error.is_transport());
    }

    #[tokio::test]
    async fn test_initial_sync_captures_position_first_and_checkpoints_it() {
        let dir = tempfile::tempdir().unwrap();
        let settings = cdc_settings(&dir, "users");
        let position_file = settings.position_file.clone();

        let mut source = MockSource::new();
        let mut sink = MockSink::new();

        source
            .expect_current_log_position()
            .times(1)
            .returning(|| Ok(BinlogPosition::new("bin.000001", 157)));
        source
            .expect_table_schema()
            .times(1)
            .returning(|_| Ok(users_schema()));
        source.expect_stream_batches().times(1).returning(|_, _, _| {
            Ok(batch_stream(vec![vec![
                vec![SqlValue::Int(1), SqlValue::Text("a@example.com".into())],
                vec![SqlValue::Int(2), SqlValue::Text("b@example.com".into())],
            ]]))
        });

        sink.expect_create_database().times(1).returning(|| Ok(()));
        sink.expect_execute()
            .withf(|sql| sql.contains("ReplacingMergeTree(_version)"))
            .times(1)
            .returning(|_| Ok(()));
        sink.expect_execute()
            .withf(|sql| sql.contains("CREATE OR REPLACE VIEW `analytics`.`users_live`"))
            .times(1)
            .returning(|_| Ok(()));
        sink.expect_insert()
            .withf(|table, columns, rows| {
                table == "users"
                    && columns == ["id", "email", "_version", "_deleted"]
                    && rows.len() == 2
                    && rows.iter().all(|row| {
                        row.len() == 4 && row[3] == SqlValue::UInt(0)
                    })
            })
            .times(1)
            .returning(|_, _, rows| Ok(rows.len()));

        // End the run right after sync by failing the stream open.
        source
            .expect_open_binlog_stream()
            .withf(|from, _| {
                from.as_ref()
                    .is_some_and(|p| p.file == "bin.000001" && p.position == 157)
            })
            .times(1)
            .returning(|_, _| Ok(change_stream(vec![Err(SyncError::Database("stop".into()))])));

        let mut replicator = CdcReplicator::new(&source, &sink, "analytics", settings);
        assert!(replicator.run().await.is_err());

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(position_file).unwrap()).unwrap();
        assert_eq!(saved["file"], "bin.000001");
        assert_eq!(saved["position"], 157);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_errors_reconnect_from_last_position() {
        let dir = tempfile::tempdir().unwrap();
        let settings = cdc_settings(&dir, "users");
        write_checkpoint(&settings, "bin.000009", 100);

        let mut source = MockSource::new();
        let mut sink = MockSink::new();

        source.expect_table_schema().returning(|_| Ok(users_schema()));

        let event = insert_event(
            "users",
            vec![vec![SqlValue::Int(7), SqlValue::Text("c@example.com".into())]],
            "bin.000009",
            250,
        );

        let mut order = mockall::Sequence::new();
        source
            .expect_open_binlog_stream()
            .times(1)
            .in_sequence(&mut order)
            .returning(move |_, _| {
                Ok(change_stream(vec![
                    Ok(event.clone()),
                    Err(SyncError::Transport("connection reset".into())),
                ]))
            });
        // The reconnect resumes past the applied event.
        source
            .expect_open_binlog_stream()
            .withf(|from, _| from.as_ref().is_some_and(|p| p.position == 250))
            .times(1)
            .in_sequence(&mut order)
            .returning(|_, _| Ok(change_stream(vec![Err(SyncError::Database("fatal".into()))])));

        sink.expect_insert()
            .withf(|table, columns, rows| {
                table == "users" && columns.len() == 4 && rows[0].len() == 4
            })
            .times(1)
            .returning(|_, _, rows| Ok(rows.len()));

        let mut replicator = CdcReplicator::new(&source, &sink, "analytics", settings);
        let error = replicator.run().await.unwrap_err();
        assert!(matches!(error, SyncError::Database(_)));
    }

    #[tokio::test]
    async fn test_apply_event_appends_version_and_delete_flag() {
        let dir = tempfile::tempdir().unwrap();
        let settings = cdc_settings(&dir, "users");

        let source = MockSource::new();
        let mut sink = MockSink::new();
        sink.expect_insert()
            .withf(|_, columns, rows| {
                columns == ["id", "email", "_version", "_deleted"]
                    && rows.len() == 1
                    && matches!(rows[0][2], SqlValue::UInt(v) if v > 0)
                    && rows[0][3] == SqlValue::UInt(1)
            })
            .times(1)
            .returning(|_, _, rows| Ok(rows.len()));

        let mut replicator = CdcReplicator::new(&source, &sink, "analytics", settings);
        replicator
            .columns
            .insert("users".to_string(), vec!["id".to_string(), "email".to_string()]);

        let mut event = insert_event(
            "users",
            vec![vec![SqlValue::Int(1), SqlValue::Text("a@example.com".into())]],
            "bin.000002",
            50,
        );
        event.kind = ChangeKind::Delete;

        assert_eq!(replicator.apply_event(&event).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_apply_event_with_no_rows_skips_the_sink() {
        let dir = tempfile::tempdir().unwrap();
        let source = MockSource::new();
        let sink = MockSink::new();

        let mut replicator =
            CdcReplicator::new(&source, &sink, "analytics", cdc_settings(&dir, "users"));
        replicator
            .columns
            .insert("users".to_string(), vec!["id".to_string()]);

        let event = insert_event("users", vec![], "bin.000002", 60);
        assert_eq!(replicator.apply_event(&event).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_apply_event_fails_loudly_on_schema_drift() {
        let dir = tempfile::tempdir().unwrap();
        let source = MockSource::new();
        let sink = MockSink::new();

        let mut replicator =
            CdcReplicator::new(&source, &sink, "analytics", cdc_settings(&dir, "users"));
        replicator
            .columns
            .insert("users".to_string(), vec!["id".to_string(), "email".to_string()]);

        // Three values against two cached columns.
        let event = insert_event(
            "users",
            vec![vec![SqlValue::Int(1), SqlValue::Null, SqlValue::Null]],
            "bin.000002",
            70,
        );

        let error = replicator.apply_event(&event).await.unwrap_err();
        assert!(matches!(error, SyncError::Database(_)));
        assert!(error.to_string().contains("altered"));
    }
}
