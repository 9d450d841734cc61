//! Layered configuration for the CLI.
//!
//! Built-in defaults, then an optional TOML file, then `MESHSTAT_*`
//! environment variables (`MESHSTAT_TRANSPORT__ENDPOINT=host:1883`).

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use rust_meshstat_common::settings::{DecoderSettings, PublishSettings, StatsSettings};
use rust_meshstat_transport::TransportOptions;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub decoder: DecoderSettings,
    pub stats: StatsSettings,
    pub publish: PublishSettings,
    pub transport: TransportOptions,
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("MESHSTAT")
                .prefix_separator("_")
                .separator("__"),
        );

        let settings: Settings = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        settings.decoder.validate()?;
        settings.stats.validate()?;

        Ok(settings)
    }
}
