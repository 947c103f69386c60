//! ClickHouse sink adapter

use async_trait::async_trait;
use clickhouse::{Client, Compression};
use tracing::{debug, info};

use chsync_core::adapter::SinkAdapter;
use chsync_core::{validate_identifier, Result, RowBatch, SyncError};
use chsync_shared::ClickHouseSettings;

use crate::ch_err;
use crate::literal::build_insert;

/// Connection adapter over the ClickHouse HTTP interface.
///
/// The client is a cheap handle over a shared connection pool, so one sink
/// serves all snapshot workers. Insert payloads travel LZ4-compressed.
pub struct ClickHouseSink {
    config: ClickHouseSettings,
    client: Option<Client>,
}

impl ClickHouseSink {
    /// Build an adapter for the configured sink. The database name is
    /// validated here, before it can reach any SQL string.
    pub fn new(config: ClickHouseSettings) -> Result<Self> {
        validate_identifier(&config.database, "database name")?;

        Ok(Self {
            config,
            client: None,
        })
    }

    pub async fn connect(&mut self) -> Result<()> {
        let client = Client::default()
            .with_url(format!("http://{}:{}", self.config.host, self.config.port))
            .with_user(self.config.user.clone())
            .with_password(self.config.password.clone())
            .with_compression(Compression::Lz4);

        client.query("SELECT 1").execute().await.map_err(ch_err)?;

        self.client = Some(client);
        info!(host = %self.config.host, "Connected to ClickHouse");
        Ok(())
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        if self.client.take().is_some() {
            info!("Disconnected from ClickHouse");
        }
        Ok(())
    }

    fn client(&self) -> Result<&Client> {
        self.client
            .as_ref()
            .ok_or(SyncError::NotConnected("clickhouse"))
    }
}

#[async_trait]
impl SinkAdapter for ClickHouseSink {
    async fn create_database(&self) -> Result<()> {
        let db = validate_identifier(&self.config.database, "database name")?;

        self.client()?
            .query(&format!("CREATE DATABASE IF NOT EXISTS `{}`", db))
            .execute()
            .await
            .map_err(ch_err)?;

        info!(database = db, "Database created/verified");
        Ok(())
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        self.client()?.query(sql).execute().await.map_err(ch_err)
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let table = validate_identifier(table, "table name")?;

        let count: u64 = self
            .client()?
            .query("SELECT count() FROM system.tables WHERE database = ? AND name = ?")
            .bind(self.config.database.as_str())
            .bind(table)
            .fetch_one()
            .await
            .map_err(ch_err)?;

        Ok(count > 0)
    }

    async fn row_count(&self, table: &str) -> Result<u64> {
        let table = validate_identifier(table, "table name")?;

        self.client()?
            .query(&format!(
                "SELECT count() FROM `{}`.`{}`",
                self.config.database, table
            ))
            .fetch_one()
            .await
            .map_err(ch_err)
    }

    async fn insert(&self, table: &str, columns: &[String], rows: RowBatch) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let table = validate_identifier(table, "table name")?;
        for column in columns {
            validate_identifier(column, "column name")?;
        }

        let sql = build_insert(&self.config.database, table, columns, &rows);
        self.client()?.query(&sql).execute().await.map_err(ch_err)?;

        debug!(table, rows = rows.len(), "Inserted batch");
        Ok(rows.len())
    }

    async fn truncate(&self, table: &str) -> Result<()> {
        let table = validate_identifier(table, "table name")?;

        self.client()?
            .query(&format!(
                "TRUNCATE TABLE `{}`.`{}`",
                self.config.database, table
            ))
            .execute()
            .await
            .map_err(ch_err)?;

        info!(table, "Table truncated");
        Ok(())
    }
}
