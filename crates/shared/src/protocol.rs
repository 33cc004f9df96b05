//! Realtime channel protocol.
//!
//! Every frame on the socket is a JSON object naming the event it belongs to:
//!
//! ```json
//! { "eventName": "device.updated", "payload": { "id": "..." } }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event names pushed by the backend or sent by the client.
pub mod events {
    pub const DEVICE_UPDATED: &str = "device.updated";
    pub const DEVICE_OFFLINE: &str = "device.offline";
    pub const DEVICE_ALERT: &str = "device.alert";
    pub const TELEMETRY: &str = "device.telemetry";
    pub const DASHBOARD_UPDATED: &str = "dashboard.updated";
    /// Client -> server: start streaming telemetry for a device.
    pub const TELEMETRY_WATCH: &str = "telemetry.watch";
}

/// A single frame on the realtime channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelFrame {
    pub event_name: String,
    #[serde(default)]
    pub payload: Value,
}

impl ChannelFrame {
    pub fn new(event_name: impl Into<String>, payload: Value) -> Self {
        Self {
            event_name: event_name.into(),
            payload,
        }
    }

    /// Encode to the JSON text sent over the socket.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a text frame received from the socket.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
