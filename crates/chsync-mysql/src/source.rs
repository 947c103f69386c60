//! MySQL source adapter

use async_trait::async_trait;
use futures::StreamExt;
use mysql_async::prelude::*;
use mysql_async::{BinlogStreamRequest, Conn, Opts, OptsBuilder, Pool, Row};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use chsync_core::adapter::{BatchStream, ChangeStream, SourceAdapter};
use chsync_core::{
    validate_identifier, BinlogPosition, ColumnInfo, KeyRole, Result, RowTuple, SyncError,
    TableSchema,
};
use chsync_shared::MySqlSettings;

use crate::mysql_err;
use crate::stream::EventStream;
use crate::value::from_mysql;

/// Replication client id announced to the server when dumping the binlog.
const SERVER_ID: u32 = 100;

/// Server-side heartbeat keeping the replication connection alive across
/// idle periods (nanoseconds).
const HEARTBEAT_PERIOD_NS: u64 = 5_000_000_000;

/// Connection adapter over `mysql_async`.
///
/// The pool is internally connection-pooled and cheap to share, so one
/// source serves all snapshot workers; streaming scans and the binlog each
/// pin a dedicated connection.
pub struct MySqlSource {
    config: MySqlSettings,
    opts: Opts,
    pool: Option<Pool>,
}

impl MySqlSource {
    /// Build an adapter for the configured source. The database name is
    /// validated here, before it can reach any SQL string.
    pub fn new(config: MySqlSettings) -> Result<Self> {
        validate_identifier(&config.database, "database name")?;

        let opts = OptsBuilder::default()
            .ip_or_hostname(config.host.clone())
            .tcp_port(config.port)
            .user(Some(config.user.clone()))
            .pass(Some(config.password.clone()))
            .db_name(Some(config.database.clone()))
            .tcp_keepalive(Some(60_000u32))
            .wait_timeout(Some(28_800))
            .into();

        Ok(Self {
            config,
            opts,
            pool: None,
        })
    }

    pub async fn connect(&mut self) -> Result<()> {
        let pool = Pool::new(self.opts.clone());

        let mut conn = pool.get_conn().await.map_err(mysql_err)?;
        conn.query_drop("SELECT 1").await.map_err(mysql_err)?;
        drop(conn);

        self.pool = Some(pool);
        info!(host = %self.config.host, database = %self.config.database, "Connected to MySQL");
        Ok(())
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        if let Some(pool) = self.pool.take() {
            pool.disconnect().await.map_err(mysql_err)?;
            info!("Disconnected from MySQL");
        }
        Ok(())
    }

    fn pool(&self) -> Result<&Pool> {
        self.pool.as_ref().ok_or(SyncError::NotConnected("mysql"))
    }
}

#[async_trait]
impl SourceAdapter for MySqlSource {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let mut conn = self.pool()?.get_conn().await.map_err(mysql_err)?;

        let tables: Vec<String> = conn
            .exec(
                "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
                 WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE' \
                 ORDER BY TABLE_NAME",
                (self.config.database.as_str(),),
            )
            .await
            .map_err(mysql_err)?;

        Ok(tables)
    }

    async fn table_schema(&self, table: &str) -> Result<TableSchema> {
        let mut conn = self.pool()?.get_conn().await.map_err(mysql_err)?;

        type ColumnRow = (
            String,
            String,
            String,
            String,
            String,
            Option<u64>,
            Option<u64>,
            Option<u64>,
        );

        let rows: Vec<ColumnRow> = conn
            .exec(
                "SELECT COLUMN_NAME, DATA_TYPE, IS_NULLABLE, COLUMN_KEY, EXTRA, \
                        CHARACTER_MAXIMUM_LENGTH, NUMERIC_PRECISION, NUMERIC_SCALE \
                 FROM INFORMATION_SCHEMA.COLUMNS \
                 WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
                 ORDER BY ORDINAL_POSITION",
                (self.config.database.as_str(), table),
            )
            .await
            .map_err(mysql_err)?;

        let columns = rows
            .into_iter()
            .map(
                |(name, data_type, is_nullable, key, extra, max_len, precision, scale)| {
                    ColumnInfo {
                        name,
                        data_type: data_type.to_lowercase(),
                        is_nullable: is_nullable == "YES",
                        key: KeyRole::from_column_key(&key),
                        extra,
                        max_char_length: max_len,
                        numeric_precision: precision,
                        numeric_scale: scale,
                    }
                },
            )
            .collect();

        Ok(TableSchema::new(table, columns))
    }

    async fn row_count(&self, table: &str) -> Result<u64> {
        let table = validate_identifier(table, "table name")?;
        let mut conn = self.pool()?.get_conn().await.map_err(mysql_err)?;

        let count: Option<u64> = conn
            .query_first(format!("SELECT COUNT(*) FROM `{}`", table))
            .await
            .map_err(mysql_err)?;

        Ok(count.unwrap_or(0))
    }

    async fn stream_batches(
        &self,
        table: &str,
        columns: &[String],
        batch_size: usize,
    ) -> Result<BatchStream> {
        let table = validate_identifier(table, "table name")?;
        let column_list = columns
            .iter()
            .map(|col| Ok(format!("`{}`", validate_identifier(col, "column name")?)))
            .collect::<Result<Vec<_>>>()?
            .join(", ");

        let sql = format!("SELECT {} FROM `{}`", column_list, table);
        let conn = self.pool()?.get_conn().await.map_err(mysql_err)?;

        // A small bounded channel: the pump task decodes the result set
        // incrementally and blocks once a couple of batches are in flight,
        // so the full table is never buffered.
        let (tx, rx) = mpsc::channel::<Result<Vec<RowTuple>>>(2);
        tokio::spawn(async move {
            if let Err(error) = pump_rows(conn, sql, batch_size, &tx).await {
                let _ = tx.send(Err(error)).await;
            }
        });

        Ok(ReceiverStream::new(rx).boxed())
    }

    async fn current_log_position(&self) -> Result<BinlogPosition> {
        let mut conn = self.pool()?.get_conn().await.map_err(mysql_err)?;

        let row: Option<Row> = conn
            .query_first("SHOW MASTER STATUS")
            .await
            .map_err(mysql_err)?;
        let mut row = row.ok_or(SyncError::BinlogDisabled)?;

        let file: String = row
            .take("File")
            .ok_or_else(|| SyncError::Database("SHOW MASTER STATUS returned no File".into()))?;
        let position: u64 = row
            .take("Position")
            .ok_or_else(|| SyncError::Database("SHOW MASTER STATUS returned no Position".into()))?;

        Ok(BinlogPosition::new(file, position))
    }

    async fn open_binlog_stream(
        &self,
        from: Option<BinlogPosition>,
        tables: &[String],
    ) -> Result<ChangeStream> {
        let resume = from.is_some();
        let position = match from {
            Some(position) => position,
            None => self.current_log_position().await?,
        };

        // The binlog dump takes over the connection, so it never comes from
        // the pool.
        let mut conn = Conn::new(self.opts.clone()).await.map_err(mysql_err)?;
        conn.query_drop(format!(
            "SET @master_heartbeat_period = {}",
            HEARTBEAT_PERIOD_NS
        ))
        .await
        .map_err(mysql_err)?;

        let request = BinlogStreamRequest::new(SERVER_ID)
            .with_filename(position.file.as_bytes())
            .with_pos(position.position);
        let binlog = conn.get_binlog_stream(request).await.map_err(mysql_err)?;

        info!(
            file = %position.file,
            position = position.position,
            resume,
            "Opened binlog stream"
        );

        Ok(EventStream::new(binlog, self.config.database.clone(), tables, &position).into_change_stream())
    }
}

async fn pump_rows(
    mut conn: Conn,
    sql: String,
    batch_size: usize,
    tx: &mpsc::Sender<Result<Vec<RowTuple>>>,
) -> Result<()> {
    let mut rows = conn.query_iter(sql).await.map_err(mysql_err)?;

    let mut batch = Vec::with_capacity(batch_size);
    while let Some(row) = rows.next().await.map_err(mysql_err)? {
        batch.push(row.unwrap().into_iter().map(from_mysql).collect());

        if batch.len() >= batch_size {
            let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
            if tx.send(Ok(full)).await.is_err() {
                // Receiver dropped; stop scanning.
                return Ok(());
            }
        }
    }
    drop(rows);

    if !batch.is_empty() {
        let _ = tx.send(Ok(batch)).await;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> MySqlSettings {
        MySqlSettings {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            database: "shop".to_string(),
        }
    }

    #[test]
    fn test_rejects_invalid_database_name() {
        let mut config = settings();
        config.database = "shop; DROP DATABASE shop".to_string();

        assert!(matches!(
            MySqlSource::new(config),
            Err(SyncError::InvalidIdentifier { context: "database name", .. })
        ));
    }

    #[tokio::test]
    async fn test_not_connected() {
        let source = MySqlSource::new(settings()).unwrap();
        assert!(matches!(
            source.row_count("users").await,
            Err(SyncError::NotConnected("mysql"))
        ));
    }

    #[tokio::test]
    async fn test_row_count_validates_before_touching_the_pool() {
        let source = MySqlSource::new(settings()).unwrap();
        // An injection attempt must fail on the identifier, not on the
        // missing connection.
        assert!(matches!(
            source.row_count("users; DROP TABLE users;--").await,
            Err(SyncError::InvalidIdentifier { .. })
        ));
    }

    #[tokio::test]
    async fn test_stream_batches_validates_columns() {
        let source = MySqlSource::new(settings()).unwrap();
        let columns = vec!["id".to_string(), "email, password FROM mysql.user;--".to_string()];

        assert!(matches!(
            source.stream_batches("users", &columns, 100).await,
            Err(SyncError::InvalidIdentifier { context: "column name", .. })
        ));
    }
}
