//! Publication payloads and the sink they are handed to.
//!
//! The decode path never talks to a broker itself. It builds a
//! [`Publication`] and passes it to a [`TelemetrySink`]; keeping the broker
//! connection alive is the sink's business.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Error;

/// Delivery guarantee requested from the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QoS {
    AtMostOnce,
    AtLeastOnce,
    /// The strongest guarantee the transport offers.
    ExactlyOnce,
}

impl QoS {
    /// Numeric level as used by broker protocols (0, 1 or 2).
    pub fn level(self) -> u8 {
        match self {
            QoS::AtMostOnce => 0,
            QoS::AtLeastOnce => 1,
            QoS::ExactlyOnce => 2,
        }
    }
}

/// Network-wide report published once per accepted latency probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub token: u32,
    #[serde(rename = "avg_cellsUsage")]
    pub avg_cells_usage: f64,
    pub avg_latency: f64,
    pub avg_pdr: f64,
    /// Node that sent the probe which triggered this report.
    pub l3_source: String,
}

/// A JSON payload addressed to a topic.
#[derive(Debug, Clone, PartialEq)]
pub struct Publication {
    pub topic: String,
    pub qos: QoS,
    /// JSON-encoded body.
    pub payload: Bytes,
}

impl Publication {
    /// Serialize `payload` as JSON and address it to `topic`.
    pub fn json<T: Serialize>(topic: impl Into<String>, qos: QoS, payload: &T) -> Result<Self, Error> {
        let body = serde_json::to_vec(payload)?;
        Ok(Self {
            topic: topic.into(),
            qos,
            payload: Bytes::from(body),
        })
    }

    /// Parse the body back into a JSON value.
    pub fn payload_json(&self) -> Result<serde_json::Value, Error> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

/// Receiver of finished publications.
///
/// `publish` is called synchronously from the decode path and must not block
/// on network I/O. Implementations must be safe to call while their own
/// background activity (keep-alive, reconnect) is running.
pub trait TelemetrySink {
    fn publish(&self, publication: Publication) -> Result<(), Error>;
}

impl<S: TelemetrySink + ?Sized> TelemetrySink for &S {
    fn publish(&self, publication: Publication) -> Result<(), Error> {
        (**self).publish(publication)
    }
}

impl<S: TelemetrySink + ?Sized> TelemetrySink for Arc<S> {
    fn publish(&self, publication: Publication) -> Result<(), Error> {
        (**self).publish(publication)
    }
}

impl<S: TelemetrySink + ?Sized> TelemetrySink for Box<S> {
    fn publish(&self, publication: Publication) -> Result<(), Error> {
        (**self).publish(publication)
    }
}
