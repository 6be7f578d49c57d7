//! # Publish/Subscribe Transport
//!
//! [`Transport`] is the outbound seam used by the publishers. The MQTT
//! implementation splits into a cheap client handle and an event loop task
//! that owns the connection, reconnects after a fixed delay and
//! re-subscribes to the control topic on every connection acknowledgement.

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::dispatch::handle_control_payload;
use super::state::NodeState;
use crate::config::{DeviceRole, TransportConfig};
use crate::error::{Result, TrackerError};

/// Pending requests between the client handle and the event loop
const REQUEST_CAPACITY: usize = 32;

/// Topic names for one device role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub live: String,
    pub control: String,
    pub status: String,
}

impl Topics {
    /// `{role}live`, `{role}control`, `{role}status`
    pub fn for_role(role: DeviceRole) -> Self {
        let prefix = role.topic_prefix();
        Self {
            live: format!("{}live", prefix),
            control: format!("{}control", prefix),
            status: format!("{}status", prefix),
        }
    }
}

/// Outbound side of the transport
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Publish at-most-once
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Transport`] when disconnected or the request
    /// cannot be queued.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;

    fn is_connected(&self) -> bool;
}

/// MQTT client handle
#[derive(Debug, Clone)]
pub struct MqttTransport {
    client: AsyncClient,
    state: Arc<NodeState>,
}

impl MqttTransport {
    /// Create the client handle and the event loop that drives it
    ///
    /// Nothing connects until [`MqttEventLoop::run`] is polled.
    pub fn new(
        config: &TransportConfig,
        identifier: &str,
        topics: &Topics,
        state: Arc<NodeState>,
    ) -> (Self, MqttEventLoop) {
        let mut options = MqttOptions::new(config.client_id(identifier), &config.broker, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_s));
        options.set_clean_session(true);

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

        let transport = Self {
            client: client.clone(),
            state: Arc::clone(&state),
        };
        let event_loop = MqttEventLoop {
            client,
            eventloop,
            control_topic: topics.control.clone(),
            reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
            state,
        };
        (transport, event_loop)
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        if !self.is_connected() {
            return Err(TrackerError::Transport("not connected".to_string()));
        }
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload)
            .map_err(|e| TrackerError::Transport(format!("publish to {} failed: {}", topic, e)))
    }

    fn is_connected(&self) -> bool {
        self.state.transport_connected()
    }
}

/// Connection owner, translates broker events into state changes
pub struct MqttEventLoop {
    client: AsyncClient,
    eventloop: EventLoop,
    control_topic: String,
    reconnect_delay: Duration,
    state: Arc<NodeState>,
}

impl std::fmt::Debug for MqttEventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttEventLoop")
            .field("control_topic", &self.control_topic)
            .field("reconnect_delay", &self.reconnect_delay)
            .finish_non_exhaustive()
    }
}

impl MqttEventLoop {
    /// Drive the connection forever
    pub async fn run(mut self) {
        info!("MQTT event loop started, control topic {}", self.control_topic);

        loop {
            match self.eventloop.poll().await {
                Ok(event) => self.handle_event(event),
                Err(e) => {
                    self.state.set_transport_connected(false);
                    warn!(
                        "MQTT connection failed: {}. Retrying in {:?}",
                        e, self.reconnect_delay
                    );
                    tokio::time::sleep(self.reconnect_delay).await;
                }
            }
        }
    }

    /// Apply one broker event to the node state
    fn handle_event(&self, event: Event) {
        match event {
            Event::Incoming(Packet::ConnAck(ack)) => {
                info!("Connected to MQTT broker ({:?})", ack.code);
                self.state.set_transport_connected(true);
                if let Err(e) = self.client.try_subscribe(&self.control_topic, QoS::AtMostOnce) {
                    warn!("Subscribe to {} failed: {}", self.control_topic, e);
                }
            }
            Event::Incoming(Packet::Publish(publish)) => {
                if publish.topic == self.control_topic {
                    handle_control_payload(&self.state, &publish.payload);
                } else {
                    debug!("Ignoring message on {}", publish.topic);
                }
            }
            Event::Incoming(Packet::Disconnect) => {
                info!("Broker closed the connection");
                self.state.set_transport_connected(false);
            }
            _ => {}
        }
    }
}
