//! Environment-driven configuration
//!
//! Every knob comes from environment variables, one prefix per section
//! (`MYSQL_*`, `CLICKHOUSE_*`, `REPLICATION_*`). Passwords may instead be
//! supplied through `*_PASSWORD_FILE` paths (Docker secrets), whose trimmed
//! contents override the plain variables.

use std::path::PathBuf;

use config::{Config, Environment};
use serde::Deserialize;

use chsync_core::{Result, SyncError};

/// Which pipeline to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicationMode {
    /// One-time full copy.
    Snapshot,
    /// Continuous change data capture.
    Cdc,
}

impl ReplicationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplicationMode::Snapshot => "snapshot",
            ReplicationMode::Cdc => "cdc",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MySqlSettings {
    pub host: String,
    #[serde(default = "default_mysql_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClickHouseSettings {
    pub host: String,
    #[serde(default = "default_clickhouse_port")]
    pub port: u16,
    #[serde(default = "default_clickhouse_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplicationSettings {
    #[serde(default = "default_mode")]
    pub mode: ReplicationMode,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Comma-separated whitelist; empty means "all tables in the schema".
    #[serde(default)]
    pub tables: String,
    #[serde(default)]
    pub drop_existing: bool,
    #[serde(default = "default_parallel_tables")]
    pub parallel_tables: usize,
    #[serde(default = "default_position_file")]
    pub position_file: PathBuf,
}

impl ReplicationSettings {
    pub fn tables_list(&self) -> Vec<String> {
        self.tables
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub mysql: MySqlSettings,
    pub clickhouse: ClickHouseSettings,
    pub replication: ReplicationSettings,
}

impl Settings {
    /// Load all sections from the process environment.
    pub fn load() -> Result<Self> {
        let mut mysql: MySqlSettings = section("MYSQL")?;
        let mut clickhouse: ClickHouseSettings = section("CLICKHOUSE")?;
        let replication: ReplicationSettings = section("REPLICATION")?;

        if let Ok(path) = std::env::var("MYSQL_PASSWORD_FILE") {
            let secret = read_secret_file(&path);
            if !secret.is_empty() {
                mysql.password = secret;
            }
        }

        if let Ok(path) = std::env::var("CLICKHOUSE_PASSWORD_FILE") {
            let secret = read_secret_file(&path);
            if !secret.is_empty() {
                clickhouse.password = secret;
            }
        }

        Ok(Settings {
            mysql,
            clickhouse,
            replication,
        })
    }
}

fn section<T: for<'de> Deserialize<'de>>(prefix: &'static str) -> Result<T> {
    Config::builder()
        .add_source(Environment::with_prefix(prefix))
        .build()
        .and_then(Config::try_deserialize)
        .map_err(|error| SyncError::Config(format!("{}: {}", prefix, error)))
}

/// Read a Docker secret file, trimmed. Missing or unreadable files yield
/// an empty string so the plain variable stays in effect.
fn read_secret_file(path: &str) -> String {
    std::fs::read_to_string(path)
        .map(|contents| contents.trim().to_string())
        .unwrap_or_default()
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_clickhouse_port() -> u16 {
    8123
}

fn default_clickhouse_user() -> String {
    "default".to_string()
}

fn default_mode() -> ReplicationMode {
    ReplicationMode::Snapshot
}

fn default_batch_size() -> usize {
    50_000
}

fn default_parallel_tables() -> usize {
    1
}

fn default_position_file() -> PathBuf {
    PathBuf::from("/data/binlog_position.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_tables_list_parsing() {
        let mut settings = ReplicationSettings {
            mode: ReplicationMode::Snapshot,
            batch_size: 50_000,
            tables: String::new(),
            drop_existing: false,
            parallel_tables: 1,
            position_file: default_position_file(),
        };

        assert!(settings.tables_list().is_empty());

        settings.tables = "users, orders ,items,".to_string();
        assert_eq!(settings.tables_list(), vec!["users", "orders", "items"]);
    }

    #[test]
    fn test_mode_as_str() {
        assert_eq!(ReplicationMode::Snapshot.as_str(), "snapshot");
        assert_eq!(ReplicationMode::Cdc.as_str(), "cdc");
    }

    #[test]
    fn test_read_secret_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  s3cret  ").unwrap();

        assert_eq!(read_secret_file(file.path().to_str().unwrap()), "s3cret");
        assert_eq!(read_secret_file("/nonexistent/secret"), "");
    }

    // Environment variables are process-global, so everything that touches
    // them lives in one test.
    #[test]
    fn test_load_from_environment() {
        for (key, value) in [
            ("MYSQL_HOST", "db.internal"),
            ("MYSQL_USER", "repl"),
            ("MYSQL_PASSWORD", "pw"),
            ("MYSQL_DATABASE", "shop"),
            ("CLICKHOUSE_HOST", "ch.internal"),
            ("CLICKHOUSE_DATABASE", "analytics"),
            ("REPLICATION_MODE", "cdc"),
            ("REPLICATION_BATCH_SIZE", "1000"),
            ("REPLICATION_TABLES", "users,orders"),
        ] {
            std::env::set_var(key, value);
        }

        let settings = Settings::load().unwrap();

        assert_eq!(settings.mysql.host, "db.internal");
        assert_eq!(settings.mysql.port, 3306);
        assert_eq!(settings.mysql.database, "shop");
        assert_eq!(settings.clickhouse.port, 8123);
        assert_eq!(settings.clickhouse.user, "default");
        assert_eq!(settings.replication.mode, ReplicationMode::Cdc);
        assert_eq!(settings.replication.batch_size, 1000);
        assert_eq!(settings.replication.tables_list(), vec!["users", "orders"]);
        assert_eq!(
            settings.replication.position_file,
            PathBuf::from("/data/binlog_position.json")
        );
    }
}
