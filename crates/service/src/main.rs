//! Motor telemetry monitor daemon (motor-monitord)

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use motor_telemetry_config::MonitorConfig;
use motor_telemetry_ingest::{
    LoggingErrorListener, MotorTelemetryPipeline, SeriesStore, TelemetrySource,
};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const STATS_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("motor_telemetry=debug,info")),
        )
        .init();

    info!("Starting motor telemetry monitor v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config().await?;
    config.validate().context("Invalid configuration")?;

    let store = Arc::new(SeriesStore::new(config.series_capacity));
    let mut pipeline =
        MotorTelemetryPipeline::new(config, store, Arc::new(LoggingErrorListener))
            .context("Failed to create telemetry pipeline")?;

    let addr = pipeline
        .start()
        .await
        .context("Failed to start telemetry pipeline")?;
    info!(%addr, log_dir = %pipeline.config().log_dir.display(), "Monitor running; press Ctrl-C to stop");

    let mut stats_tick = interval(STATS_INTERVAL);
    stats_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    stats_tick.tick().await;

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                break;
            }
            _ = stats_tick.tick() => {
                let stats = pipeline.stats();
                info!(
                    received = stats.received,
                    rejected = stats.rejected,
                    transitions = stats.transitions,
                    exported = stats.exported_entries,
                    failed_exports = stats.failed_exports,
                    "Ingestion statistics"
                );
            }
        }
    }

    pipeline
        .shutdown()
        .await
        .context("Failed to stop telemetry pipeline")?;
    info!("Monitor stopped");
    Ok(())
}

async fn load_config() -> Result<MonitorConfig> {
    let path = match MonitorConfig::default_config_path() {
        Ok(path) => path,
        Err(e) => {
            warn!("No config location, using defaults: {}", e);
            return Ok(MonitorConfig::default());
        }
    };

    match MonitorConfig::load_from_path(&path).await {
        Ok(config) => {
            info!(path = %path.display(), "Loaded configuration");
            Ok(config)
        }
        Err(e) => {
            warn!(path = %path.display(), "Failed to load config, using defaults: {}", e);
            Ok(MonitorConfig::default())
        }
    }
}
