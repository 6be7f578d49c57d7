//! # Node Runtime
//!
//! Wires the workers together and keeps them running until Ctrl+C.
//!
//! ```text
//! GNSS serial -> reader -> watch<Fix> -> fusion -> handoff -> consumer
//!                                                              |-> live publisher -> transport
//!                                                              |-> persist queue -> log store
//! transport event loop -> control messages -> NodeState <- indicator, status publisher
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::control::dispatch::{run_live_publisher, run_status_publisher};
use crate::control::{MqttTransport, NodeState, Topics, Transport};
use crate::error::Result;
use crate::indicator::{IndicatorEngine, TracingIndicator};
use crate::nmea::protocol::Fix;
use crate::position::reader::{configure_receiver, run_reader};
use crate::position::PositionParser;
use crate::sensors::{build_sensors, role_sensors, SensorKind};
use crate::serial::SensorSerial;
use crate::storage::{LogStore, PersistentLog};
use crate::telemetry::fusion::FusionProducer;
use crate::telemetry::handoff::{run_consumer, SnapshotHandoff};

/// Open the GNSS receiver, start every worker and run until Ctrl+C
///
/// # Errors
///
/// Returns error if the GNSS port or the log store cannot be opened.
pub async fn run(config: Config) -> Result<()> {
    let mut gnss = SensorSerial::open(&config.gps.port, config.gps.baud_rate)?;
    info!("GNSS receiver opened at {}", gnss.device_path());

    if let Err(e) = configure_receiver(&mut gnss, config.gps.update_rate_hz).await {
        warn!("Could not configure GNSS update rate: {}", e);
    }

    let state = Arc::new(NodeState::new());
    let workers = spawn_workers(&config, gnss, state)?;
    supervise(workers).await;
    Ok(())
}

/// Spawn every worker of the node onto the current runtime
pub fn spawn_workers(
    config: &Config,
    gnss: SensorSerial,
    state: Arc<NodeState>,
) -> Result<JoinSet<()>> {
    let identifier = config.device.identifier.clone();
    let role = config.device.role;
    let topics = Topics::for_role(role);
    let mut workers = JoinSet::new();

    let store = LogStore::open(config.storage.db_path(&identifier))?;
    let (persist_tx, persist_rx) = mpsc::channel(config.storage.queue_capacity);
    workers.spawn(
        PersistentLog::new(
            store,
            Arc::clone(&state),
            persist_rx,
            Duration::from_millis(config.storage.erase_poll_ms),
        )
        .run(),
    );

    let (fix_tx, fix_rx) = watch::channel(Fix::default());
    workers.spawn(run_reader(
        gnss,
        PositionParser::new(config.gps.max_speed_knots),
        fix_tx,
        Duration::from_millis(config.gps.read_timeout_ms),
    ));

    let sensors = build_sensors(config);
    if let Some(wind_reader) = sensors.wind_reader {
        workers.spawn(wind_reader.run());
    }

    let handoff = Arc::new(SnapshotHandoff::new());
    let producer = FusionProducer::new(&identifier, fix_rx, sensors.sensors, &config.fusion);
    workers.spawn(producer.run(Arc::clone(&handoff)));
    workers.spawn(run_consumer(handoff, Arc::clone(&state), persist_tx));

    let (transport, event_loop) =
        MqttTransport::new(&config.transport, &identifier, &topics, Arc::clone(&state));
    let transport: Arc<dyn Transport> = Arc::new(transport);
    workers.spawn(event_loop.run());
    workers.spawn(run_live_publisher(
        Arc::clone(&state),
        Arc::clone(&transport),
        topics.live.clone(),
        Duration::from_millis(config.transport.live_interval_ms),
    ));
    workers.spawn(run_status_publisher(
        Arc::clone(&state),
        transport,
        topics.status.clone(),
        identifier.clone(),
        Duration::from_millis(config.transport.status_interval_ms),
    ));

    let link_monitored = role_sensors(role).contains(&SensorKind::Link);
    workers.spawn(
        IndicatorEngine::new(state, link_monitored)
            .run(TracingIndicator::default(), Duration::from_millis(config.indicator.cycle_ms)),
    );

    info!(
        "Node {} ({:?}) started {} workers, topics {}/{}/{}",
        identifier,
        role,
        workers.len(),
        topics.live,
        topics.control,
        topics.status
    );
    Ok(workers)
}

/// Wait for Ctrl+C; a worker that stops is reported and the rest keep going
async fn supervise(mut workers: JoinSet<()>) {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
            Some(joined) = workers.join_next() => match joined {
                Ok(()) => warn!("A worker stopped, {} still running", workers.len()),
                Err(e) => error!("Worker failed: {}", e),
            },
        }
    }
    workers.abort_all();
}
