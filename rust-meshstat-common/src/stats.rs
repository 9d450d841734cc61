//! Per-node delivery statistics and the network-wide rollup.
//!
//! Every accepted latency probe adds one sample to its node. The node's
//! averages are recomputed immediately, and the rollup is recomputed from all
//! nodes afterwards. Samples are never evicted.

use log::trace;
use serde::Serialize;
use std::collections::HashMap;

use crate::settings::StatsSettings;

/// One latency probe's contribution to its node's statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSample {
    pub node_id: String,
    pub counter: u16,
    pub num_cells_used: u8,
    pub latency_ms: f64,
}

/* ---------------------------------------------------------------- *
 * Per-node statistics
 * ---------------------------------------------------------------- */

/// Samples and derived averages for a single node.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeStats {
    /// Sequence counters, kept sorted ascending.
    counters: Vec<u16>,
    latencies: Vec<f64>,
    cells_used: Vec<u8>,
    avg_cells_usage: f64,
    avg_latency: f64,
    avg_pdr: f64,
}

impl NodeStats {
    fn push(&mut self, sample: &ProbeSample, slots_per_slotframe: u32) {
        self.counters.push(sample.counter);
        self.latencies.push(sample.latency_ms);
        self.cells_used.push(sample.num_cells_used);

        let cells: f64 = self.cells_used.iter().map(|&c| f64::from(c)).sum();
        self.avg_cells_usage = cells / self.cells_used.len() as f64 / f64::from(slots_per_slotframe);

        self.avg_latency = self.latencies.iter().sum::<f64>() / self.latencies.len() as f64;

        // sorting loses arrival order for good
        self.counters.sort_unstable();
        self.avg_pdr = delivery_ratio(&self.counters);
    }

    /// Mean fraction of the slotframe used by the node.
    pub fn avg_cells_usage(&self) -> f64 {
        self.avg_cells_usage
    }

    /// Mean latency in milliseconds.
    pub fn avg_latency(&self) -> f64 {
        self.avg_latency
    }

    /// Estimated packet delivery ratio.
    pub fn avg_pdr(&self) -> f64 {
        self.avg_pdr
    }

    /// Sequence counters seen so far, ascending.
    pub fn counters(&self) -> &[u16] {
        &self.counters
    }

    pub fn latencies(&self) -> &[f64] {
        &self.latencies
    }

    pub fn cells_used(&self) -> &[u8] {
        &self.cells_used
    }

    /// Number of probes recorded for this node.
    pub fn samples(&self) -> usize {
        self.latencies.len()
    }
}

/// Distinct counters over the counter span `1 + max - min`.
///
/// `sorted` must be sorted ascending and non-empty.
fn delivery_ratio(sorted: &[u16]) -> f64 {
    let (first, last) = match (sorted.first(), sorted.last()) {
        (Some(&first), Some(&last)) => (first, last),
        _ => return 0.0,
    };
    let distinct = 1 + sorted.windows(2).filter(|w| w[0] != w[1]).count();
    let span = 1 + i64::from(last) - i64::from(first);
    distinct as f64 / span as f64
}

/* ---------------------------------------------------------------- *
 * Network rollup
 * ---------------------------------------------------------------- */

/// Unweighted mean of every node's averages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct NetworkRollup {
    pub avg_cells_usage: f64,
    pub avg_latency: f64,
    pub avg_pdr: f64,
}

impl NetworkRollup {
    /// Recompute the rollup from scratch. An empty set of nodes gives all zeros.
    pub fn recompute<'a>(nodes: impl IntoIterator<Item = &'a NodeStats>) -> Self {
        let mut sum = Self::default();
        let mut count = 0usize;

        for node in nodes {
            sum.avg_cells_usage += node.avg_cells_usage;
            sum.avg_latency += node.avg_latency;
            sum.avg_pdr += node.avg_pdr;
            count += 1;
        }

        if count == 0 {
            return sum;
        }

        let n = count as f64;
        Self {
            avg_cells_usage: sum.avg_cells_usage / n,
            avg_latency: sum.avg_latency / n,
            avg_pdr: sum.avg_pdr / n,
        }
    }
}

/* ---------------------------------------------------------------- *
 * Tracker
 * ---------------------------------------------------------------- */

/// Accumulator of per-node statistics fed by the decode path.
///
/// Implementations are driven from a single thread; callers that decode
/// from several threads must serialize access themselves.
pub trait StatsTracker {
    /// Add a sample and return the node's updated statistics.
    fn record(&mut self, sample: ProbeSample) -> &NodeStats;

    /// Statistics for one node.
    fn node(&self, node_id: &str) -> Option<&NodeStats>;

    /// All tracked nodes, in no particular order.
    fn nodes(&self) -> Box<dyn Iterator<Item = (&str, &NodeStats)> + '_>;

    /// Network-wide rollup over every tracked node.
    fn rollup(&self) -> NetworkRollup {
        NetworkRollup::recompute(self.nodes().map(|(_, stats)| stats))
    }
}

/// Unbounded in-memory tracker keyed by node id.
#[derive(Debug, Clone, Default)]
pub struct NodeStatsTracker {
    settings: StatsSettings,
    nodes: HashMap<String, NodeStats>,
}

impl NodeStatsTracker {
    pub fn new(settings: StatsSettings) -> Self {
        Self {
            settings,
            nodes: HashMap::new(),
        }
    }

    /// Number of nodes seen so far.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl StatsTracker for NodeStatsTracker {
    fn record(&mut self, sample: ProbeSample) -> &NodeStats {
        let slots = self.settings.slots_per_slotframe;
        let stats = self.nodes.entry(sample.node_id.clone()).or_default();
        stats.push(&sample, slots);

        trace!(
            "node {}: {} samples, pdr={:.3} latency={:.1}ms cells={:.3}",
            sample.node_id,
            stats.samples(),
            stats.avg_pdr,
            stats.avg_latency,
            stats.avg_cells_usage
        );

        stats
    }

    fn node(&self, node_id: &str) -> Option<&NodeStats> {
        self.nodes.get(node_id)
    }

    fn nodes(&self) -> Box<dyn Iterator<Item = (&str, &NodeStats)> + '_> {
        Box::new(self.nodes.iter().map(|(id, stats)| (id.as_str(), stats)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(node_id: &str, counter: u16, num_cells_used: u8, latency_ms: f64) -> ProbeSample {
        ProbeSample {
            node_id: node_id.to_string(),
            counter,
            num_cells_used,
            latency_ms,
        }
    }

    #[test]
    fn test_pdr_with_duplicates_and_gaps() {
        let mut tracker = NodeStatsTracker::default();
        for counter in [1, 2, 2, 5] {
            tracker.record(sample("a", counter, 1, 0.0));
        }

        let stats = tracker.node("a").unwrap();
        assert!((stats.avg_pdr() - 0.6).abs() < 1e-12);
        assert_eq!(stats.counters(), &[1, 2, 2, 5]);
    }

    #[test]
    fn test_counters_sorted_in_place() {
        let mut tracker = NodeStatsTracker::default();
        for counter in [9, 3, 7] {
            tracker.record(sample("a", counter, 1, 0.0));
        }

        let stats = tracker.node("a").unwrap();
        assert_eq!(stats.counters(), &[3, 7, 9]);
        assert!((stats.avg_pdr() - 3.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_cells_usage_and_latency() {
        let mut tracker = NodeStatsTracker::new(StatsSettings::default());
        tracker.record(sample("a", 1, 10, 100.0));
        tracker.record(sample("a", 2, 20, 200.0));
        let stats = tracker.record(sample("a", 3, 30, 600.0));

        assert_eq!(stats.avg_cells_usage(), 20.0 / 64.0);
        assert_eq!(stats.avg_latency(), 300.0);
        assert_eq!(stats.avg_pdr(), 1.0);
        assert_eq!(stats.samples(), 3);
        assert_eq!(stats.cells_used(), &[10, 20, 30]);
        assert_eq!(stats.latencies(), &[100.0, 200.0, 600.0]);
    }

    #[test]
    fn test_cells_usage_is_not_truncated() {
        let mut tracker = NodeStatsTracker::default();
        tracker.record(sample("a", 1, 1, 0.0));
        let stats = tracker.record(sample("a", 2, 2, 0.0));

        assert_eq!(stats.avg_cells_usage(), 1.5 / 64.0);
    }

    #[test]
    fn test_single_sample_node() {
        let mut tracker = NodeStatsTracker::default();
        let stats = tracker.record(sample("a", 42, 4, 60.0));

        assert_eq!(stats.avg_pdr(), 1.0);
        assert_eq!(stats.avg_latency(), 60.0);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_rollup_is_unweighted_mean() {
        let mut tracker = NodeStatsTracker::default();
        // a: pdr 0.5 from counters {1, 4}
        tracker.record(sample("a", 1, 32, 100.0));
        tracker.record(sample("a", 4, 32, 100.0));
        // b: pdr 1.0, one sample only but weighted like a
        tracker.record(sample("b", 7, 0, 300.0));

        let rollup = tracker.rollup();
        assert_eq!(rollup.avg_pdr, 0.75);
        assert_eq!(rollup.avg_latency, 200.0);
        assert_eq!(rollup.avg_cells_usage, 0.25);
    }

    #[test]
    fn test_rollup_empty() {
        let tracker = NodeStatsTracker::default();
        assert!(tracker.is_empty());
        assert_eq!(tracker.rollup(), NetworkRollup::default());
    }

    #[test]
    fn test_nodes_never_removed() {
        let mut tracker = NodeStatsTracker::default();
        tracker.record(sample("a", 1, 1, 1.0));
        tracker.record(sample("b", 1, 1, 1.0));
        tracker.record(sample("a", 2, 1, 1.0));

        let mut ids: Vec<&str> = tracker.nodes().map(|(id, _)| id).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(tracker.node("c").is_none());
    }
}
