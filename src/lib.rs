//! meshstat: decoder and delivery statistics for mesh telemetry frames.
//!
//! Facade over the workspace crates. Most users want [`TelemetryParser`]
//! wired to a sink from [`transport`].

pub use rust_meshstat_common as common;
pub use rust_meshstat_transport as transport;

pub use rust_meshstat_common::{
    Error, NetworkRollup, NodeStats, NodeStatsTracker, ParsedData, ProbeReport, Publication, QoS,
    Result, StatsTracker, TelemetryParser, TelemetrySink,
};
