//! BizTime API server.
//!
//! Bootstraps the database, then serves `/companies` and `/invoices` until
//! Ctrl-C. Settings come from `BIZTIME_*` environment variables.

use anyhow::Context;
use biztime_core::{bootstrap, build_server, AppConfig, ServerConfig};
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDR: &str = "127.0.0.1:3000";

fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("biztime=info,biztime_core=info"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;

    let config = AppConfig::from_env();
    let address: SocketAddr = std::env::var("BIZTIME_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()
        .context("BIZTIME_ADDR must be a socket address")?;

    info!(
        mode = ?config.mode,
        database = %config.target_database(),
        "Starting BizTime"
    );

    let (db, report) = bootstrap(&config)
        .await
        .context("database bootstrap failed")?;
    info!(
        database_created = report.database_created,
        tables_created = ?report.tables_created,
        tables_seeded = ?report.tables_seeded,
        "Bootstrap complete"
    );

    let server = build_server(
        db.clone(),
        config,
        ServerConfig {
            address,
            ..ServerConfig::default()
        },
    )?;
    server.serve().await?;

    db.close().await;
    info!("Server stopped");
    Ok(())
}
