//! Telemetry transport for meshstat.
//!
//! The decode path hands finished publications to a [`ChannelSink`]. A
//! [`TelemetryPublisher`] task owns the other end of the channel and the
//! MQTT session with the broker: it connects, keeps the link alive,
//! reconnects when it drops and re-sends whatever the broker has not yet
//! acknowledged.

mod config;
mod publisher;
mod sink;

pub use config::{TransportKind, TransportOptions};
pub use publisher::{Envelope, TelemetryPublisher};
pub use sink::ChannelSink;

/// Default MQTT broker endpoint
pub const DEFAULT_BROKER_ADDRESS: &str = "argus.paris.inria.fr:1883";

/// MQTT client identifier
pub const DEFAULT_CLIENT_ID: &str = "uinject";

/// Delay between connection attempts in milliseconds
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 5000;

/// MQTT keep-alive interval in milliseconds
pub const DEFAULT_KEEP_ALIVE_INTERVAL_MS: u64 = 30000;

/// Publications queued between the decode path and the publisher task
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;
