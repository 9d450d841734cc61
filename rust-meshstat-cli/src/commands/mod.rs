//! Subcommand implementations for the meshstat CLI

pub mod decode;
pub mod replay;

use anyhow::{Context, Result};
use log::info;
use rust_meshstat_common::{NodeStatsTracker, TelemetryParser};
use rust_meshstat_transport::{ChannelSink, TelemetryPublisher};
use std::time::Duration;

use crate::settings::Settings;

/// A parser wired to a freshly spawned publisher.
pub struct Collector {
    pub parser: TelemetryParser<NodeStatsTracker, ChannelSink>,
    publisher: TelemetryPublisher,
}

impl Collector {
    pub fn start(settings: &Settings) -> Result<Self> {
        info!(
            "Publishing to {} via {:?} ({})",
            settings.publish.topic, settings.transport.kind, settings.transport.endpoint
        );

        let (sink, publisher) = TelemetryPublisher::spawn(settings.transport.clone());
        let parser = TelemetryParser::new(
            settings.decoder.clone(),
            settings.publish.clone(),
            NodeStatsTracker::new(settings.stats.clone()),
            sink,
        )
        .context("Failed to create parser")?;

        Ok(Self { parser, publisher })
    }

    /// Drop the sink, let queued reports drain and hand back the statistics.
    pub async fn finish(self, drain_timeout: Duration) -> Result<NodeStatsTracker> {
        let (tracker, sink) = self.parser.into_parts();
        drop(sink);
        self.publisher.shutdown(drain_timeout).await?;
        Ok(tracker)
    }
}
