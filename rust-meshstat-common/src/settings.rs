//! Settings for the decode path.
//!
//! Every struct deserializes with defaults for missing fields, so a partial
//! configuration file only needs to name what it changes.

use serde::Deserialize;

use crate::error::Error;
use crate::sink::QoS;
use crate::types::{
    HEADER_LENGTH, PROBE_MARKER, PROBE_MIN_RESIDUAL, PROBE_TAIL_LENGTH, SLOTS_PER_SLOTFRAME,
    SLOT_DURATION_MS,
};

/// Default topic for probe reports.
pub const DEFAULT_TOPIC: &str = "opentestbed/uinject/arrived";

/// Token value every report carries.
pub const DEFAULT_TOKEN: u32 = 123;

/// Frame decoder settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DecoderSettings {
    /// Length of the link header preceding the ASN.
    pub header_length: usize,

    /// Duration of one slot in milliseconds.
    pub slot_duration_ms: f64,

    /// ASCII marker that closes a latency probe.
    pub probe_marker: String,

    /// A residual must be longer than this to be checked for the marker.
    pub probe_min_residual: usize,
}

impl Default for DecoderSettings {
    fn default() -> Self {
        Self {
            header_length: HEADER_LENGTH,
            slot_duration_ms: SLOT_DURATION_MS,
            probe_marker: PROBE_MARKER.to_string(),
            probe_min_residual: PROBE_MIN_RESIDUAL,
        }
    }
}

impl DecoderSettings {
    /// Reject settings the decoder cannot work with.
    pub fn validate(&self) -> Result<(), Error> {
        if self.probe_marker.is_empty() {
            return Err(Error::Config("probe_marker must not be empty".into()));
        }
        // residuals passing the gate must hold every probe field
        if self.probe_min_residual + 1 < PROBE_TAIL_LENGTH {
            return Err(Error::Config(format!(
                "probe_min_residual must be at least {}, got {}",
                PROBE_TAIL_LENGTH - 1,
                self.probe_min_residual
            )));
        }
        if !self.slot_duration_ms.is_finite() || self.slot_duration_ms <= 0.0 {
            return Err(Error::Config(format!(
                "slot_duration_ms must be positive, got {}",
                self.slot_duration_ms
            )));
        }
        Ok(())
    }
}

/// Statistics settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StatsSettings {
    /// Slots per slotframe, the denominator of cell usage.
    pub slots_per_slotframe: u32,
}

impl Default for StatsSettings {
    fn default() -> Self {
        Self {
            slots_per_slotframe: SLOTS_PER_SLOTFRAME,
        }
    }
}

impl StatsSettings {
    pub fn validate(&self) -> Result<(), Error> {
        if self.slots_per_slotframe == 0 {
            return Err(Error::Config("slots_per_slotframe must be non-zero".into()));
        }
        Ok(())
    }
}

/// Where and how probe reports are published.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PublishSettings {
    pub topic: String,
    pub token: u32,
    pub qos: QoS,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            token: DEFAULT_TOKEN,
            qos: QoS::ExactlyOnce,
        }
    }
}
