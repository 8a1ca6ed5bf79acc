//! Relay entry point.
//!
//! Loads settings from the environment (and `.env`), then either refreshes
//! the clearance cookie once or keeps it fresh on a schedule until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use clearance_relay::{ClearanceRelay, Settings, VERSION};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = Settings::from_env().context("invalid configuration")?;
    log::info!(
        "clearance-relay {VERSION} starting ({} -> {})",
        settings.solver_kind(),
        settings.update_endpoint()
    );

    let relay = Arc::new(ClearanceRelay::from_settings(&settings)?);

    let Some(interval) = settings.interval() else {
        relay.refresh().await?;
        return Ok(());
    };

    let scheduler = relay.into_scheduler(interval, settings.min_interval())?;
    scheduler.start();

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    log::info!("shutting down");
    scheduler.stop().await;
    Ok(())
}
