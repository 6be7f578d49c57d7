//! # Tracker Node
//!
//! Field telemetry node for boat, buoy and hub tracking units.
//!
//! Reads position from a GNSS receiver, fuses it with the auxiliary sensors
//! of the configured role, streams live data and status over MQTT, and logs
//! time-valid snapshots to a local SQLite file.
//!
//! # Usage
//!
//! ```bash
//! tracker-node [config.toml]
//! ```
//!
//! The configuration path defaults to `config/default.toml`.

use anyhow::{Context, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use tracker_node::config::{Config, LoggingConfig};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Console logging plus an optional daily rolling file
///
/// The returned guard flushes the file writer and must outlive the node.
fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let level: tracing::Level = config
        .level
        .parse()
        .with_context(|| format!("invalid log level '{}'", config.level))?;
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let (file_layer, guard) = match &config.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "tracker-node.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&path).with_context(|| format!("failed to load {}", path))?;

    let _guard = init_logging(&config.logging)?;

    info!("Tracker Node v{} starting...", env!("CARGO_PKG_VERSION"));
    info!(
        "Device {} as {:?}, config {}",
        config.device.identifier, config.device.role, path
    );

    tracker_node::node::run(config).await?;

    info!("Shutdown complete");
    Ok(())
}
