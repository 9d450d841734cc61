//! Common types and utilities for meshstat, the mesh telemetry collector.
//!
//! This crate holds everything on the synchronous decode path: fixed-offset
//! frame decoding, absolute slot number arithmetic, the per-node delivery
//! statistics and the network-wide rollup, plus the seam (`TelemetrySink`)
//! through which finished reports leave the process.

pub mod asn;
pub mod error;
pub mod frame;
pub mod parser;
pub mod settings;
pub mod sink;
pub mod stats;
pub mod types;

/// Reexport of common types
pub use error::{Error, FieldRange};
pub use parser::{ParsedData, TelemetryParser};
pub use sink::{ProbeReport, Publication, QoS, TelemetrySink};
pub use stats::{NetworkRollup, NodeStats, NodeStatsTracker, StatsTracker};
pub type Result<T> = std::result::Result<T, Error>;
