//! Capture replay command implementation for meshstat CLI

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rust_meshstat_common::StatsTracker;
use std::{path::Path, time::Duration};

use super::Collector;
use crate::settings::Settings;
use crate::utils::{format_duration, parse_hex_frame, print_header, Timer};

/// Feed every frame of a capture file through the parser and summarize the statistics
pub async fn replay_file(settings: &Settings, file: &Path, drain_timeout_ms: u64) -> Result<()> {
    let capture = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read capture file: {}", file.display()))?;

    let timer = Timer::new("replay");
    let mut collector = Collector::start(settings)?;

    let mut decoded = 0usize;
    let mut probes = 0usize;
    let mut failed = 0usize;

    for (lineno, line) in capture.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let result = parse_hex_frame(line).and_then(|bytes| Ok(collector.parser.parse_input(bytes)?));
        match result {
            Ok(parsed) => {
                decoded += 1;
                if parsed.report.is_some() {
                    probes += 1;
                }
                debug!("line {}: {} residual bytes from {}", lineno + 1, parsed.residual.len(), parsed.source);
            }
            Err(e) => {
                failed += 1;
                warn!("line {}: {:#}", lineno + 1, e);
            }
        }
    }

    let tracker = collector.finish(Duration::from_millis(drain_timeout_ms)).await?;
    let elapsed = timer.elapsed();

    print_header("Replay");
    println!("Frames decoded: {}", decoded);
    println!("Latency probes: {}", probes);
    println!("Frames failed: {}", failed);
    println!("Elapsed: {}", format_duration(elapsed));

    let mut nodes: Vec<_> = tracker.nodes().collect();
    nodes.sort_by(|a, b| a.0.cmp(b.0));

    print_header("Nodes");
    println!("{:<8} {:>8} {:>8} {:>12} {:>10}", "node", "samples", "pdr", "latency_ms", "cells");
    for (id, stats) in &nodes {
        println!(
            "{:<8} {:>8} {:>8.3} {:>12.1} {:>10.3}",
            id,
            stats.samples(),
            stats.avg_pdr(),
            stats.avg_latency(),
            stats.avg_cells_usage()
        );
    }

    let rollup = tracker.rollup();
    print_header("Network");
    println!("avg_pdr: {:.3}", rollup.avg_pdr);
    println!("avg_latency: {:.1} ms", rollup.avg_latency);
    println!("avg_cellsUsage: {:.3}", rollup.avg_cells_usage);

    info!("Replayed {} frames from {}", decoded + failed, file.display());
    Ok(())
}
