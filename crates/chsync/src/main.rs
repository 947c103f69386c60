//! MySQL to ClickHouse replicator entry point
//!
//! No CLI arguments: configuration is entirely environment-driven (see
//! `chsync_shared::config`). Exits 0 on success, 1 on configuration
//! failure, any snapshot table mismatch, or an unrecovered CDC error.

use std::process::ExitCode;

use tracing::{error, info};

use chsync::cdc::CdcReplicator;
use chsync::snapshot::{self, SnapshotReplicator};
use chsync_clickhouse::ClickHouseSink;
use chsync_mysql::MySqlSource;
use chsync_shared::{init_logging, ReplicationMode, Settings};

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    info!("MySQL to ClickHouse replicator starting");

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(error) => {
            error!(%error, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    info!(mode = settings.replication.mode.as_str(), "Replication mode");

    match run(settings).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            error!(%error, "Replication failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(settings: Settings) -> anyhow::Result<bool> {
    let mut source = MySqlSource::new(settings.mysql.clone())?;
    let mut sink = ClickHouseSink::new(settings.clickhouse.clone())?;

    source.connect().await?;
    if let Err(error) = sink.connect().await {
        disconnect(&mut source, &mut sink).await;
        return Err(error.into());
    }

    let outcome = dispatch(&settings, &source, &sink).await;

    disconnect(&mut source, &mut sink).await;
    outcome
}

async fn dispatch(
    settings: &Settings,
    source: &MySqlSource,
    sink: &ClickHouseSink,
) -> anyhow::Result<bool> {
    let database = settings.clickhouse.database.clone();

    match settings.replication.mode {
        ReplicationMode::Snapshot => {
            let replicator =
                SnapshotReplicator::new(source, sink, database, settings.replication.clone());
            let results = replicator.run().await?;

            let failed: Vec<&str> = results
                .iter()
                .filter(|result| !result.success)
                .map(|result| result.table.as_str())
                .collect();
            if !failed.is_empty() {
                error!(failed_tables = ?failed, "Some tables failed to replicate");
            } else {
                info!("All tables replicated successfully");
            }

            Ok(snapshot::all_succeeded(&results))
        }
        ReplicationMode::Cdc => {
            let mut replicator =
                CdcReplicator::new(source, sink, database, settings.replication.clone());
            replicator.run().await?;
            Ok(true)
        }
    }
}

async fn disconnect(source: &mut MySqlSource, sink: &mut ClickHouseSink) {
    if let Err(error) = source.disconnect().await {
        error!(%error, "Failed to disconnect from MySQL");
    }
    if let Err(error) = sink.disconnect().await {
        error!(%error, "Failed to disconnect from ClickHouse");
    }
}
