//! Frame decoding command implementation for meshstat CLI

use anyhow::Result;
use log::{info, warn};
use std::time::Duration;

use super::Collector;
use crate::settings::Settings;
use crate::utils::{format_hex, parse_hex_frame};

/// Decode each hex-encoded frame and print what it carries
pub async fn decode_frames(settings: &Settings, frames: Vec<String>) -> Result<()> {
    info!("Decoding {} frame(s)", frames.len());

    let mut collector = Collector::start(settings)?;

    for (i, hex) in frames.iter().enumerate() {
        println!("Frame {}:", i + 1);

        let bytes = match parse_hex_frame(hex) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Frame {} is not valid hex: {}", i + 1, e);
                println!("  error: {:#}", e);
                continue;
            }
        };

        match collector.parser.parse_input(bytes) {
            Ok(parsed) => {
                println!("  Event: {}", parsed.event_type);
                println!("  Source: {}", parsed.source);
                println!("  Residual ({} bytes): {}", parsed.residual.len(), format_hex(&parsed.residual));
                if let Some(report) = parsed.report {
                    println!("  Probe from node {}", report.l3_source);
                    println!("    avg_pdr: {:.3}", report.avg_pdr);
                    println!("    avg_latency: {:.1} ms", report.avg_latency);
                    println!("    avg_cellsUsage: {:.3}", report.avg_cells_usage);
                }
            }
            Err(e) => {
                warn!("Frame {} could not be decoded: {}", i + 1, e);
                println!("  error: {}", e);
            }
        }
    }

    collector.finish(Duration::from_secs(5)).await?;
    Ok(())
}
