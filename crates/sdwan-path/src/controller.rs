//! SD-WAN Controller
//!
//! Owns the topology store and the flow registry, and evaluates every
//! registered flow against one consistent view of the topology.

use crate::config::ScoringWeights;
use crate::error::{ErrorKind, PathError, Result};
use crate::flow::{FlowRegistry, TrafficFlow};
use crate::scorer::{PathResult, PathScorer};
use crate::telemetry::LinkSample;
use crate::topology::{Link, LinkUpdate, NodeRole, TopologyStore};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Per-flow evaluation outcome
///
/// Serializes as `{path, metrics, score}` on success and `{error}` on failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FlowOutcome {
    /// A path was found and scored
    Routed(PathResult),
    /// The flow could not be routed
    Failed {
        /// Failure classification
        error: ErrorKind,
    },
}

impl FlowOutcome {
    /// Path result, if routed
    pub fn result(&self) -> Option<&PathResult> {
        match self {
            Self::Routed(result) => Some(result),
            Self::Failed { .. } => None,
        }
    }

    /// Error classification, if failed
    pub fn error(&self) -> Option<ErrorKind> {
        match self {
            Self::Routed(_) => None,
            Self::Failed { error } => Some(*error),
        }
    }
}

impl From<Result<PathResult>> for FlowOutcome {
    fn from(result: Result<PathResult>) -> Self {
        match result {
            Ok(path) => Self::Routed(path),
            Err(e) => Self::Failed { error: e.kind() },
        }
    }
}

/// Results of one evaluation pass, keyed by flow id
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Evaluation {
    outcomes: BTreeMap<String, FlowOutcome>,
}

impl Evaluation {
    /// Outcome for one flow
    pub fn get(&self, flow_id: &str) -> Option<&FlowOutcome> {
        self.outcomes.get(flow_id)
    }

    /// All outcomes, in flow-id order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FlowOutcome)> + '_ {
        self.outcomes.iter().map(|(id, outcome)| (id.as_str(), outcome))
    }

    /// Successfully routed flows
    pub fn routed(&self) -> impl Iterator<Item = (&str, &PathResult)> + '_ {
        self.iter()
            .filter_map(|(id, outcome)| outcome.result().map(|r| (id, r)))
    }

    /// Flows that failed, with their error kind
    pub fn failed(&self) -> impl Iterator<Item = (&str, ErrorKind)> + '_ {
        self.iter()
            .filter_map(|(id, outcome)| outcome.error().map(|e| (id, e)))
    }

    /// Number of flows evaluated
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// True when no flows were evaluated
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Pretty JSON rendering
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| PathError::Config(e.to_string()))
    }

    fn insert(&mut self, flow_id: String, outcome: FlowOutcome) {
        self.outcomes.insert(flow_id, outcome);
    }
}

/// Controller counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ControllerStats {
    /// Completed `evaluate_all` passes
    pub evaluations: u64,
    /// Flows routed across all passes
    pub routed: u64,
    /// Flows that failed across all passes
    pub failed: u64,
}

/// SD-WAN controller
pub struct SdwanController {
    /// Shared topology
    topology: TopologyStore,
    /// Registered flows
    flows: FlowRegistry,
    /// Path scorer
    scorer: PathScorer,
    evaluations: AtomicU64,
    routed: AtomicU64,
    failed: AtomicU64,
}

impl SdwanController {
    /// Create with stock scoring coefficients
    pub fn new() -> Self {
        Self::with_weights(ScoringWeights::default())
    }

    /// Create with custom scoring coefficients
    pub fn with_weights(weights: ScoringWeights) -> Self {
        Self::with_store(TopologyStore::new(), weights)
    }

    /// Create around an existing topology store
    pub fn with_store(topology: TopologyStore, weights: ScoringWeights) -> Self {
        Self {
            topology,
            flows: FlowRegistry::new(),
            scorer: PathScorer::with_weights(weights),
            evaluations: AtomicU64::new(0),
            routed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Add a site
    pub fn add_node(&self, id: &str, role: NodeRole) -> Result<()> {
        self.topology.add_node(id, role)?;
        info!("Added {:?} node {}", role, id);
        Ok(())
    }

    /// Add a link between two sites
    pub fn add_link(&self, a: &str, b: &str, link: Link) -> Result<()> {
        self.topology.add_link(a, b, link)?;
        info!(
            "Added link {} <-> {} ({:.1}ms, {:.1}Mbps)",
            a, b, link.latency, link.bandwidth
        );
        Ok(())
    }

    /// Merge partial metrics into one link
    pub fn update_link_metrics(&self, a: &str, b: &str, update: &LinkUpdate) -> Result<Link> {
        self.topology.update_link_metrics(a, b, update)
    }

    /// Apply a telemetry batch, all or nothing
    pub fn apply_updates(&self, batch: &[LinkSample]) -> Result<usize> {
        self.topology.apply_updates(batch)
    }

    /// Register a flow (last write wins)
    pub fn register_flow(&self, id: &str, flow: TrafficFlow) -> Result<Option<TrafficFlow>> {
        debug!(
            "Registering flow {}: {} -> {} ({})",
            id, flow.source, flow.destination, flow.sensitivity
        );
        self.flows.register(id, flow)
    }

    /// Look up a flow
    pub fn flow(&self, id: &str) -> Result<TrafficFlow> {
        self.flows.get(id)
    }

    /// Flow registry
    pub fn flows(&self) -> &FlowRegistry {
        &self.flows
    }

    /// Shared topology handle
    pub fn topology(&self) -> &TopologyStore {
        &self.topology
    }

    /// Best path for a single registered flow
    pub fn best_path(&self, flow_id: &str) -> Result<PathResult> {
        let flow = self.flows.get(flow_id)?;
        let topology = self.topology.read();
        self.scorer.best_path(&topology, &flow)
    }

    /// Route every registered flow
    ///
    /// Holds the topology read lock for the whole pass, so all flows see the
    /// same link metrics. A flow that cannot be routed yields a per-flow error
    /// entry; the other flows are still evaluated.
    pub fn evaluate_all(&self) -> Evaluation {
        let flows = self.flows.snapshot();
        let topology = self.topology.read();
        let mut evaluation = Evaluation::default();
        let mut failed = 0u64;

        for (flow_id, flow) in flows {
            let result = self.scorer.best_path(&topology, &flow);
            if let Err(e) = &result {
                warn!("Flow {} not routed: {}", flow_id, e);
                failed += 1;
            }
            evaluation.insert(flow_id, result.into());
        }
        drop(topology);

        let total = evaluation.len() as u64;
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        self.routed.fetch_add(total - failed, Ordering::Relaxed);
        self.failed.fetch_add(failed, Ordering::Relaxed);
        debug!("Evaluated {} flows ({} failed)", total, failed);

        evaluation
    }

    /// Counter snapshot
    pub fn stats(&self) -> ControllerStats {
        ControllerStats {
            evaluations: self.evaluations.load(Ordering::Relaxed),
            routed: self.routed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

impl Default for SdwanController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::Sensitivity;
    use crate::telemetry::LinkSample;

    fn controller() -> SdwanController {
        let c = SdwanController::new();
        c.add_node("HQ", NodeRole::Hub).unwrap();
        c.add_node("Branch1", NodeRole::Cpe).unwrap();
        c.add_node("Branch2", NodeRole::Cpe).unwrap();
        c.add_node("CloudGW", NodeRole::Cloud).unwrap();
        c.add_link("HQ", "Branch1", Link::new(30.0, 5.0, 0.1, 50.0, 1.0)).unwrap();
        c.add_link("HQ", "Branch2", Link::new(40.0, 8.0, 0.2, 50.0, 1.0)).unwrap();
        c.add_link("Branch1", "Branch2", Link::new(20.0, 3.0, 0.05, 20.0, 2.0)).unwrap();
        c.add_link("Branch1", "CloudGW", Link::new(60.0, 15.0, 0.3, 100.0, 3.0)).unwrap();
        c.add_link("Branch2", "CloudGW", Link::new(70.0, 20.0, 0.4, 100.0, 3.0)).unwrap();

        c.register_flow("voip1", TrafficFlow::new("Branch1", "HQ", 0.5, 1, Sensitivity::Latency))
            .unwrap();
        c.register_flow("backup1", TrafficFlow::new("Branch1", "CloudGW", 20.0, 4, Sensitivity::Throughput))
            .unwrap();
        c.register_flow("video1", TrafficFlow::new("Branch2", "HQ", 5.0, 2, Sensitivity::Reliability))
            .unwrap();
        c
    }

    #[test]
    fn test_evaluate_scenario() {
        let c = controller();
        let eval = c.evaluate_all();

        assert_eq!(eval.len(), 3);
        assert_eq!(c.flows().len(), 3);
        let voip = eval.get("voip1").and_then(FlowOutcome::result).unwrap();
        assert_eq!(voip.path, vec!["Branch1", "HQ"]);
        assert!((voip.score - 83.5).abs() < 1e-9);
        assert_eq!(eval.failed().count(), 0);
    }

    #[test]
    fn test_partial_failure_isolation() {
        let c = controller();
        c.add_node("Island", NodeRole::Cpe).unwrap();
        c.register_flow("stranded", TrafficFlow::new("HQ", "Island", 1.0, 1, Sensitivity::Latency))
            .unwrap();
        c.register_flow("ghost", TrafficFlow::new("HQ", "Mars", 1.0, 1, Sensitivity::Latency))
            .unwrap();

        let eval = c.evaluate_all();

        assert_eq!(eval.len(), 5);
        assert_eq!(eval.routed().count(), 3);
        let failed: Vec<_> = eval.failed().collect();
        assert_eq!(
            failed,
            vec![("ghost", ErrorKind::UnknownNode), ("stranded", ErrorKind::NoPath)]
        );

        let stats = c.stats();
        assert_eq!((stats.evaluations, stats.routed, stats.failed), (1, 3, 2));
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let c = controller();
        assert_eq!(c.evaluate_all(), c.evaluate_all());
    }

    #[test]
    fn test_update_changes_choice() {
        let c = controller();
        c.update_link_metrics("HQ", "Branch1", &LinkUpdate::new().latency(100.0))
            .unwrap();

        let voip = c.best_path("voip1").unwrap();
        assert_eq!(voip.path, vec!["Branch1", "Branch2", "HQ"]);
        assert_eq!(voip.metrics.latency, 60.0);
        assert!(matches!(c.best_path("nope"), Err(PathError::UnknownFlow(_))));
    }

    #[test]
    fn test_json_shape() {
        let c = controller();
        c.register_flow("ghost", TrafficFlow::new("HQ", "Mars", 1.0, 1, Sensitivity::Latency))
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&c.evaluate_all().to_json().unwrap()).unwrap();

        assert_eq!(json["voip1"]["path"], serde_json::json!(["Branch1", "HQ"]));
        assert_eq!(json["voip1"]["metrics"]["latency"], serde_json::json!(30.0));
        assert!(json["voip1"]["score"].is_number());
        assert_eq!(json["ghost"], serde_json::json!({ "error": "unknown_node" }));
    }

    #[test]
    fn test_zero_hop_bandwidth_renders_null() {
        let c = controller();
        c.register_flow("local", TrafficFlow::new("HQ", "HQ", 1.0, 1, Sensitivity::Throughput))
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&c.evaluate_all().to_json().unwrap()).unwrap();

        assert_eq!(json["local"]["path"], serde_json::json!(["HQ"]));
        assert!(json["local"]["metrics"]["bandwidth"].is_null());
        assert_eq!(json["local"]["score"], serde_json::json!(100.0));
    }

    #[test]
    fn test_concurrent_updates_and_reads() {
        let c = SdwanController::new();
        for id in ["w", "x", "y", "z"] {
            c.add_node(id, NodeRole::Cpe).unwrap();
        }
        for (a, b) in [("w", "x"), ("x", "y"), ("y", "z")] {
            c.add_link(a, b, Link::new(10.0, 1.0, 0.0, 100.0, 0.0)).unwrap();
        }
        c.register_flow("first", TrafficFlow::new("x", "y", 1.0, 1, Sensitivity::Latency))
            .unwrap();
        c.register_flow("second", TrafficFlow::new("y", "z", 1.0, 1, Sensitivity::Latency))
            .unwrap();

        // Every write keeps latency == 10 * jitter; the batch moves x-y and y-z together
        std::thread::scope(|s| {
            s.spawn(|| {
                for step in 2..=500 {
                    let jitter = f64::from(step);
                    let update = LinkUpdate::new().latency(10.0 * jitter).jitter(jitter);
                    c.apply_updates(&[
                        LinkSample::new("x", "y", update),
                        LinkSample::new("y", "z", update),
                    ])
                    .unwrap();
                    c.update_link_metrics("w", "x", &update).unwrap();
                }
            });

            for _ in 0..2 {
                s.spawn(|| {
                    for _ in 0..200 {
                        let link = c.topology().link_between("x", "w").unwrap();
                        assert_eq!(link.latency, 10.0 * link.jitter);

                        let eval = c.evaluate_all();
                        let first = eval.get("first").and_then(FlowOutcome::result).unwrap();
                        let second = eval.get("second").and_then(FlowOutcome::result).unwrap();
                        assert_eq!(first.metrics.latency, 10.0 * first.metrics.jitter);
                        assert_eq!(first.metrics, second.metrics);
                    }
                });
            }
        });

        assert_eq!(c.stats().evaluations, 400);
        assert_eq!(c.topology().link_between("y", "z").unwrap().latency, 5000.0);
    }
}
