//! # Control Plane
//!
//! Shared node state, the publish/subscribe transport, and the handlers
//! that connect the two.

pub mod dispatch;
pub mod state;
pub mod transport;

pub use dispatch::{handle_control_payload, ControlMessage, StatusPayload};
pub use state::{ControlState, EraseStatus, NodeState};
pub use transport::{MqttEventLoop, MqttTransport, Topics, Transport};
