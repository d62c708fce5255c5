//! Sensitivity-weighted path search and path quality scoring

use crate::config::ScoringWeights;
use crate::error::{PathError, Result};
use crate::flow::{Sensitivity, TrafficFlow};
use crate::topology::{Link, Topology};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use tracing::debug;

/// Metrics aggregated along a path
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PathMetrics {
    /// Sum of per-hop latency (ms)
    pub latency: f64,
    /// Sum of per-hop jitter (ms)
    pub jitter: f64,
    /// End-to-end loss percentage, `1 - prod(1 - loss/100)` scaled to percent
    pub packet_loss: f64,
    /// Bottleneck bandwidth (Mbps); infinite for a zero-hop path, which
    /// renders as JSON `null`
    pub bandwidth: f64,
}

impl PathMetrics {
    /// Metrics of a zero-hop path
    pub const fn empty() -> Self {
        Self {
            latency: 0.0,
            jitter: 0.0,
            packet_loss: 0.0,
            bandwidth: f64::INFINITY,
        }
    }

    /// Extend the path by one hop
    #[inline]
    pub fn push(&mut self, link: &Link) {
        self.latency += link.latency;
        self.jitter += link.jitter;
        // Compose survival probabilities in percent units; exact for 0% hops
        // and for single-hop paths.
        self.packet_loss = self.packet_loss + link.packet_loss
            - self.packet_loss * link.packet_loss / 100.0;
        self.bandwidth = self.bandwidth.min(link.bandwidth);
    }
}

/// Chosen path for one flow
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathResult {
    /// Node ids from source to destination
    pub path: Vec<String>,
    /// Aggregated metrics
    pub metrics: PathMetrics,
    /// Quality score (0.0 - 100.0)
    pub score: f64,
}

impl PathResult {
    /// Number of links traversed
    pub fn hops(&self) -> usize {
        self.path.len().saturating_sub(1)
    }
}

/// Path scorer parameterized by scoring coefficients
#[derive(Debug, Clone, Copy, Default)]
pub struct PathScorer {
    weights: ScoringWeights,
}

impl PathScorer {
    /// Create with stock coefficients
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom coefficients
    pub fn with_weights(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Active coefficients
    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Per-edge search weight for a sensitivity; never negative for a valid link
    #[inline]
    pub fn edge_weight(&self, sensitivity: Sensitivity, link: &Link) -> f64 {
        match sensitivity {
            Sensitivity::Latency => link.latency,
            Sensitivity::Throughput => 1.0 / link.bandwidth,
            Sensitivity::Reliability => {
                link.packet_loss + self.weights.reliability_edge_jitter * link.jitter
            }
            Sensitivity::Unspecified => 1.0,
        }
    }

    /// Pick and score the best path for a flow
    pub fn best_path(&self, topology: &Topology, flow: &TrafficFlow) -> Result<PathResult> {
        topology.ensure_node(&flow.source)?;
        topology.ensure_node(&flow.destination)?;

        let path = self.shortest_path(topology, &flow.source, &flow.destination, flow.sensitivity)?;
        let metrics = Self::aggregate(topology, &path)?;
        let score = self.score(&metrics, flow);

        debug!(
            "Selected path {} for {} flow (score: {:.1}, latency: {:.1}ms)",
            path.join(" -> "),
            flow.sensitivity,
            score,
            metrics.latency
        );

        Ok(PathResult {
            path,
            metrics,
            score,
        })
    }

    /// Dijkstra over sensitivity-specific edge weights
    ///
    /// Heap entries order by `(cost, node id)`, neighbours are visited in id
    /// order and only strict improvements relax a node, so equal-cost ties
    /// always resolve the same way. A reachable destination is found even
    /// when its accumulated cost overflows to infinity.
    pub fn shortest_path(
        &self,
        topology: &Topology,
        from: &str,
        to: &str,
        sensitivity: Sensitivity,
    ) -> Result<Vec<String>> {
        let mut distances: HashMap<&str, f64> = HashMap::new();
        let mut previous: HashMap<&str, &str> = HashMap::new();
        let mut heap = BinaryHeap::new();

        distances.insert(from, 0.0);
        heap.push(DijkstraState { cost: 0.0, node: from });

        while let Some(DijkstraState { cost, node }) = heap.pop() {
            if node == to {
                let mut path = vec![to.to_string()];
                let mut current = to;
                while let Some(prev) = previous.get(current) {
                    path.push(prev.to_string());
                    current = *prev;
                }
                path.reverse();
                return Ok(path);
            }

            if distances.get(node).is_some_and(|best| cost > *best) {
                continue;
            }

            for neighbor in topology.neighbors(node)? {
                let link = topology.link_between(node, neighbor)?;
                let next = cost + self.edge_weight(sensitivity, link);
                // An undiscovered node is reachable even when its cost overflows
                if distances.get(neighbor).map_or(true, |best| next < *best) {
                    distances.insert(neighbor, next);
                    previous.insert(neighbor, node);
                    heap.push(DijkstraState { cost: next, node: neighbor });
                }
            }
        }

        Err(PathError::NoPath {
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    /// Aggregate per-hop metrics along `path`
    pub fn aggregate(topology: &Topology, path: &[String]) -> Result<PathMetrics> {
        let mut metrics = PathMetrics::empty();
        for hop in path.windows(2) {
            metrics.push(topology.link_between(&hop[0], &hop[1])?);
        }
        Ok(metrics)
    }

    /// Score aggregated metrics for a flow, clamped to 0-100
    pub fn score(&self, metrics: &PathMetrics, flow: &TrafficFlow) -> f64 {
        let w = &self.weights;
        let raw = match flow.sensitivity {
            Sensitivity::Latency => {
                100.0 - w.latency_score_latency * metrics.latency
                    - w.latency_score_jitter * metrics.jitter
            }
            Sensitivity::Throughput => metrics.bandwidth / flow.required_bandwidth * 100.0,
            Sensitivity::Reliability => {
                100.0 - w.reliability_score_loss * metrics.packet_loss
                    - w.reliability_score_jitter * metrics.jitter
            }
            // No scoring rule exists for flows without a stated concern;
            // they get a configurable neutral value.
            Sensitivity::Unspecified => w.unspecified_score,
        };

        if raw.is_nan() {
            return 0.0;
        }
        raw.clamp(0.0, 100.0)
    }
}

/// Pick and score the best path using stock coefficients
pub fn best_path(topology: &Topology, flow: &TrafficFlow) -> Result<PathResult> {
    PathScorer::new().best_path(topology, flow)
}

#[derive(Debug, Clone, Copy)]
struct DijkstraState<'a> {
    cost: f64,
    node: &'a str,
}

impl Eq for DijkstraState<'_> {}

impl PartialEq for DijkstraState<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Ord for DijkstraState<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(self.node))
    }
}

impl PartialOrd for DijkstraState<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
