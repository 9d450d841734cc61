//! Configuration for the telemetry transport.

use serde::Deserialize;

use crate::{
    DEFAULT_BROKER_ADDRESS, DEFAULT_CHANNEL_CAPACITY, DEFAULT_CLIENT_ID,
    DEFAULT_KEEP_ALIVE_INTERVAL_MS, DEFAULT_RECONNECT_INTERVAL_MS,
};

/// Where publications go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// MQTT session with the broker.
    Mqtt,
    /// Line-delimited JSON on standard output.
    Stdout,
}

/// Transport configuration options
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TransportOptions {
    pub kind: TransportKind,

    /// MQTT broker address (`host:port`)
    pub endpoint: String,

    /// MQTT client identifier, also the key of the broker-side session
    pub client_id: String,

    /// Delay between connection attempts (in milliseconds)
    pub reconnect_interval_ms: u64,

    /// Keep alive interval (in milliseconds, at least five seconds)
    pub keep_alive_interval_ms: u64,

    /// Capacity of the outbound channel
    pub channel_capacity: usize,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            kind: TransportKind::Mqtt,
            endpoint: DEFAULT_BROKER_ADDRESS.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            reconnect_interval_ms: DEFAULT_RECONNECT_INTERVAL_MS,
            keep_alive_interval_ms: DEFAULT_KEEP_ALIVE_INTERVAL_MS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl TransportOptions {
    /// Options for printing publications instead of sending them.
    pub fn stdout() -> Self {
        Self {
            kind: TransportKind::Stdout,
            ..Default::default()
        }
    }
}
