//! Drift monitoring and drift-triggered reoptimization
//!
//! Each ingest captures a snapshot of per-link latency, jitter and loss,
//! diffs it against the baseline snapshot and signals a recompute once the
//! cumulative absolute change reaches the configured threshold. The first
//! ingest only establishes the baseline.

use crate::config::{BaselinePolicy, DriftConfig};
use crate::controller::{Evaluation, SdwanController};
use crate::error::Result;
use crate::telemetry::{LinkSample, MetricsSource};
use crate::topology::{EdgeKey, Topology};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Tracked metrics of one link at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeSample {
    /// Latency (ms)
    pub latency: f64,
    /// Jitter (ms)
    pub jitter: f64,
    /// Packet loss (%)
    pub packet_loss: f64,
}

impl EdgeSample {
    const ZERO: Self = Self {
        latency: 0.0,
        jitter: 0.0,
        packet_loss: 0.0,
    };

    /// Sum of absolute per-metric differences
    #[inline]
    pub fn distance(&self, other: &Self) -> f64 {
        (self.latency - other.latency).abs()
            + (self.jitter - other.jitter).abs()
            + (self.packet_loss - other.packet_loss).abs()
    }
}

/// Per-link metrics captured at one instant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriftSnapshot {
    edges: BTreeMap<EdgeKey, EdgeSample>,
}

impl DriftSnapshot {
    /// Capture every link of the topology
    pub fn capture(topology: &Topology) -> Self {
        let edges = topology
            .links()
            .map(|(key, link)| {
                let sample = EdgeSample {
                    latency: link.latency,
                    jitter: link.jitter,
                    packet_loss: link.packet_loss,
                };
                (key.clone(), sample)
            })
            .collect();
        Self { edges }
    }

    /// Sample for one link
    pub fn get(&self, a: &str, b: &str) -> Option<&EdgeSample> {
        self.edges.get(&EdgeKey::new(a, b))
    }

    /// Number of links captured
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// True when no links were captured
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Cumulative absolute change relative to `previous`
    ///
    /// A link present in only one of the two snapshots contributes its full
    /// magnitude.
    pub fn drift_from(&self, previous: &DriftSnapshot) -> f64 {
        let changed: f64 = self
            .edges
            .iter()
            .map(|(key, now)| now.distance(previous.edges.get(key).unwrap_or(&EdgeSample::ZERO)))
            .sum();
        let vanished: f64 = previous
            .edges
            .iter()
            .filter(|(key, _)| !self.edges.contains_key(*key))
            .map(|(_, before)| before.distance(&EdgeSample::ZERO))
            .sum();
        changed + vanished
    }
}

/// Outcome of one ingest
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DriftDecision {
    /// Whether paths should be recomputed
    pub triggered: bool,
    /// Measured drift; `None` on the cold-start ingest
    pub drift: Option<f64>,
}

/// Snapshot-diffing drift detector
#[derive(Debug)]
pub struct DriftMonitor {
    config: DriftConfig,
    last_snapshot: Option<DriftSnapshot>,
    history: Vec<DriftSnapshot>,
}

impl DriftMonitor {
    /// Create a monitor
    pub fn new(config: DriftConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            last_snapshot: None,
            history: Vec::new(),
        })
    }

    /// Active configuration
    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    /// Capture the topology and decide whether to reoptimize
    pub fn ingest(&mut self, topology: &Topology) -> DriftDecision {
        self.observe(DriftSnapshot::capture(topology))
    }

    /// Decide on an already captured snapshot
    pub fn observe(&mut self, snapshot: DriftSnapshot) -> DriftDecision {
        let drift = self.last_snapshot.as_ref().map(|last| snapshot.drift_from(last));
        let Some(drift) = drift else {
            debug!("Drift baseline established over {} links", snapshot.len());
            self.history.push(snapshot.clone());
            self.last_snapshot = Some(snapshot);
            return DriftDecision {
                triggered: false,
                drift: None,
            };
        };

        let triggered = drift >= self.config.threshold;
        debug!(
            "Measured drift {:.3} against threshold {:.3}",
            drift, self.config.threshold
        );

        let advance = match self.config.baseline {
            BaselinePolicy::Always => true,
            BaselinePolicy::OnTrigger => triggered,
        };
        self.history.push(snapshot.clone());
        if advance {
            self.last_snapshot = Some(snapshot);
        }

        DriftDecision {
            triggered,
            drift: Some(drift),
        }
    }

    /// Current comparison baseline
    pub fn last_snapshot(&self) -> Option<&DriftSnapshot> {
        self.last_snapshot.as_ref()
    }

    /// Every snapshot ingested so far, oldest first
    pub fn history(&self) -> &[DriftSnapshot] {
        &self.history
    }
}

/// Reoptimizer counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReoptimizerStats {
    /// Ingest cycles run
    pub ingests: u64,
    /// Cycles that triggered a recompute
    pub triggers: u64,
}

/// Feeds telemetry into the controller and recomputes paths on drift
pub struct Reoptimizer {
    controller: Arc<SdwanController>,
    monitor: Mutex<DriftMonitor>,
    ingests: AtomicU64,
    triggers: AtomicU64,
}

impl Reoptimizer {
    /// Create a reoptimizer over a shared controller
    pub fn new(controller: Arc<SdwanController>, config: DriftConfig) -> Result<Self> {
        Ok(Self {
            controller,
            monitor: Mutex::new(DriftMonitor::new(config)?),
            ingests: AtomicU64::new(0),
            triggers: AtomicU64::new(0),
        })
    }

    /// Controller being driven
    pub fn controller(&self) -> &Arc<SdwanController> {
        &self.controller
    }

    /// Apply a telemetry batch, then report whether drift crossed the threshold
    ///
    /// The batch goes through the controller's update path. A rejected batch
    /// leaves the topology and the drift baseline untouched.
    pub fn ingest(&self, batch: &[LinkSample]) -> Result<bool> {
        Ok(self.ingest_decision(batch)?.triggered)
    }

    /// Like [`Reoptimizer::ingest`], returning the measured drift as well
    pub fn ingest_decision(&self, batch: &[LinkSample]) -> Result<DriftDecision> {
        // Monitor lock spans apply and capture so concurrent ingests record
        // history in the order their batches were applied
        let mut monitor = self.monitor.lock();
        if !batch.is_empty() {
            self.controller.apply_updates(batch)?;
        }
        let snapshot = DriftSnapshot::capture(&self.controller.topology().read());
        let decision = monitor.observe(snapshot);
        drop(monitor);

        self.ingests.fetch_add(1, Ordering::Relaxed);
        if decision.triggered {
            self.triggers.fetch_add(1, Ordering::Relaxed);
            info!(
                "Drift {:.2} reached threshold, reoptimizing paths",
                decision.drift.unwrap_or_default()
            );
        }
        Ok(decision)
    }

    /// Ingest a batch and recompute every flow when triggered
    pub fn tick(&self, batch: &[LinkSample]) -> Result<Option<Evaluation>> {
        if self.ingest(batch)? {
            Ok(Some(self.controller.evaluate_all()))
        } else {
            Ok(None)
        }
    }

    /// Pull the next batch from a feed and tick
    pub fn poll(&self, source: &mut dyn MetricsSource) -> Result<Option<Evaluation>> {
        let batch = {
            let topology = self.controller.topology().read();
            source.sample(&topology)
        };
        self.tick(&batch)
    }

    /// Number of snapshots recorded so far
    pub fn history_len(&self) -> usize {
        self.monitor.lock().history().len()
    }

    /// Counter snapshot
    pub fn stats(&self) -> ReoptimizerStats {
        ReoptimizerStats {
            ingests: self.ingests.load(Ordering::Relaxed),
            triggers: self.triggers.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::{Sensitivity, TrafficFlow};
    use crate::telemetry::ScriptedSource;
    use crate::topology::{Link, LinkUpdate, NodeRole};
    use proptest::prelude::*;

    fn topology() -> Topology {
        let mut t = Topology::new();
        t.add_node("a", NodeRole::Hub).unwrap();
        t.add_node("b", NodeRole::Cpe).unwrap();
        t.add_node("c", NodeRole::Cloud).unwrap();
        t.add_link("a", "b", Link::new(30.0, 5.0, 0.1, 50.0, 1.0)).unwrap();
        t.add_link("b", "c", Link::new(20.0, 3.0, 0.05, 20.0, 2.0)).unwrap();
        t
    }

    fn controller() -> Arc<SdwanController> {
        let c = SdwanController::new();
        c.add_node("a", NodeRole::Hub).unwrap();
        c.add_node("b", NodeRole::Cpe).unwrap();
        c.add_node("c", NodeRole::Cloud).unwrap();
        c.add_link("a", "b", Link::new(30.0, 5.0, 0.1, 50.0, 1.0)).unwrap();
        c.add_link("b", "c", Link::new(20.0, 3.0, 0.05, 20.0, 2.0)).unwrap();
        c.add_link("a", "c", Link::new(60.0, 9.0, 0.2, 100.0, 1.0)).unwrap();
        c.register_flow("voip", TrafficFlow::new("a", "c", 1.0, 1, Sensitivity::Latency))
            .unwrap();
        Arc::new(c)
    }

    #[test]
    fn test_cold_start_never_triggers() {
        let mut monitor = DriftMonitor::new(DriftConfig::new(0.0)).unwrap();
        let decision = monitor.ingest(&topology());

        assert!(!decision.triggered);
        assert_eq!(decision.drift, None);
        assert_eq!(monitor.history().len(), 1);
        assert!(monitor.last_snapshot().is_some());
    }

    #[test]
    fn test_single_metric_drift_is_exact() {
        let before = topology();
        let mut after = before.clone();
        after
            .update_link_metrics("a", "b", &LinkUpdate::new().latency(37.5))
            .unwrap();

        let drift = DriftSnapshot::capture(&after).drift_from(&DriftSnapshot::capture(&before));
        assert_eq!(drift, 7.5);
    }

    #[test]
    fn test_bandwidth_and_cost_are_not_tracked() {
        let before = topology();
        let mut after = before.clone();
        after
            .update_link_metrics("a", "b", &LinkUpdate::new().bandwidth(1.0).cost(9.0))
            .unwrap();

        let drift = DriftSnapshot::capture(&after).drift_from(&DriftSnapshot::capture(&before));
        assert_eq!(drift, 0.0);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut t = topology();
        let mut monitor = DriftMonitor::new(DriftConfig::new(10.0)).unwrap();
        monitor.ingest(&t);

        t.update_link_metrics("a", "b", &LinkUpdate::new().latency(40.0)).unwrap();
        let decision = monitor.ingest(&t);
        assert!(decision.triggered);
        assert_eq!(decision.drift, Some(10.0));
    }

    #[test]
    fn test_baseline_always_advances() {
        let mut t = topology();
        let mut monitor = DriftMonitor::new(DriftConfig::new(10.0)).unwrap();
        monitor.ingest(&t);

        // Two sub-threshold steps never add up under the default policy
        t.update_link_metrics("a", "b", &LinkUpdate::new().latency(36.0)).unwrap();
        assert!(!monitor.ingest(&t).triggered);
        t.update_link_metrics("a", "b", &LinkUpdate::new().latency(42.0)).unwrap();
        let decision = monitor.ingest(&t);

        assert!(!decision.triggered);
        assert_eq!(decision.drift, Some(6.0));
        assert_eq!(monitor.history().len(), 3);
    }

    #[test]
    fn test_baseline_on_trigger_accumulates() {
        let mut t = topology();
        let config = DriftConfig::new(10.0).with_baseline(BaselinePolicy::OnTrigger);
        let mut monitor = DriftMonitor::new(config).unwrap();
        monitor.ingest(&t);

        t.update_link_metrics("a", "b", &LinkUpdate::new().latency(36.0)).unwrap();
        assert!(!monitor.ingest(&t).triggered);
        t.update_link_metrics("a", "b", &LinkUpdate::new().latency(42.0)).unwrap();
        let decision = monitor.ingest(&t);

        assert!(decision.triggered);
        assert_eq!(monitor.config().baseline, BaselinePolicy::OnTrigger);
        assert_eq!(decision.drift, Some(12.0));
        assert_eq!(monitor.history().len(), 3);
        assert_eq!(monitor.last_snapshot().unwrap().get("b", "a").unwrap().latency, 42.0);
    }

    #[test]
    fn test_added_link_counts_in_full() {
        let before = topology();
        let mut after = before.clone();
        after.add_link("a", "c", Link::new(4.0, 1.0, 0.5, 10.0, 0.0)).unwrap();

        let drift = DriftSnapshot::capture(&after).drift_from(&DriftSnapshot::capture(&before));
        assert_eq!(drift, 5.5);
        let reverse = DriftSnapshot::capture(&before).drift_from(&DriftSnapshot::capture(&after));
        assert_eq!(reverse, 5.5);
    }

    #[test]
    fn test_reoptimizer_tick() {
        let controller = controller();
        let reopt = Reoptimizer::new(controller.clone(), DriftConfig::new(10.0)).unwrap();
        assert!(Arc::ptr_eq(reopt.controller(), &controller));

        assert!(reopt.tick(&[]).unwrap().is_none());

        let small = [LinkSample::new("a", "b", LinkUpdate::new().jitter(6.0))];
        assert!(reopt.tick(&small).unwrap().is_none());

        // a-b-c becomes slower than the direct a-c link
        let big = [LinkSample::new("b", "a", LinkUpdate::new().latency(50.0))];
        let eval = reopt.tick(&big).unwrap().expect("drift of 20 must trigger");
        let voip = eval.get("voip").and_then(|o| o.result()).unwrap();
        assert_eq!(voip.path, vec!["a", "c"]);

        assert_eq!(reopt.stats(), ReoptimizerStats { ingests: 3, triggers: 1 });
        assert_eq!(reopt.history_len(), 3);
        assert_eq!(controller.stats().evaluations, 1);
    }

    #[test]
    fn test_rejected_batch_leaves_state() {
        let controller = controller();
        let reopt = Reoptimizer::new(controller.clone(), DriftConfig::new(1.0)).unwrap();
        reopt.ingest(&[]).unwrap();

        let bad = [
            LinkSample::new("a", "b", LinkUpdate::new().latency(500.0)),
            LinkSample::new("a", "b", LinkUpdate::new().packet_loss(-1.0)),
        ];
        assert!(reopt.ingest(&bad).is_err());
        assert_eq!(controller.topology().link_between("a", "b").unwrap().latency, 30.0);
        assert_eq!(reopt.history_len(), 1);

        let unknown = [LinkSample::new("b", "zz", LinkUpdate::new().latency(1.0))];
        assert!(reopt.ingest(&unknown).is_err());
    }

    #[test]
    fn test_poll_uses_source() {
        let controller = controller();
        let reopt = Reoptimizer::new(controller, DriftConfig::new(5.0)).unwrap();
        let mut source = ScriptedSource::new(vec![
            vec![],
            vec![LinkSample::new("a", "c", LinkUpdate::new().latency(70.0))],
        ]);

        assert!(reopt.poll(&mut source).unwrap().is_none());
        assert!(reopt.poll(&mut source).unwrap().is_some());
        assert!(reopt.poll(&mut source).unwrap().is_none());
    }

    #[test]
    fn test_concurrent_ingests_keep_history_ordered() {
        let reopt = Reoptimizer::new(controller(), DriftConfig::new(1e9)).unwrap();

        std::thread::scope(|s| {
            for worker in 0..4u32 {
                let reopt = &reopt;
                s.spawn(move || {
                    for i in 0..50u32 {
                        let latency = f64::from(worker * 1000 + i);
                        let batch = [LinkSample::new("a", "b", LinkUpdate::new().latency(latency))];
                        reopt.ingest(&batch).unwrap();
                    }
                });
            }
        });

        assert_eq!(reopt.history_len(), 200);
        assert_eq!(reopt.stats().ingests, 200);

        // The newest snapshot matches the topology every batch left behind
        let current = reopt.controller().topology().link_between("a", "b").unwrap().latency;
        let monitor = reopt.monitor.lock();
        let newest = monitor.history().last().unwrap();
        assert_eq!(newest.get("a", "b").unwrap().latency, current);
        assert_eq!(monitor.last_snapshot(), Some(newest));
    }

    #[test]
    fn test_rejects_invalid_threshold() {
        assert!(DriftMonitor::new(DriftConfig::new(f64::NAN)).is_err());
    }

    proptest! {
        #[test]
        fn single_edge_latency_delta_equals_drift(delta in -20.0..500.0f64) {
            let before = topology();
            let mut after = before.clone();
            after
                .update_link_metrics("b", "c", &LinkUpdate::new().latency(20.0 + delta))
                .unwrap();

            let drift = DriftSnapshot::capture(&after).drift_from(&DriftSnapshot::capture(&before));
            prop_assert!((drift - delta.abs()).abs() < 1e-9);
        }

        #[test]
        fn first_ingest_never_triggers(threshold in 0.0..100.0f64, latency in 0.0..1e4f64) {
            let mut t = topology();
            t.update_link_metrics("a", "b", &LinkUpdate::new().latency(latency)).unwrap();
            let mut monitor = DriftMonitor::new(DriftConfig::new(threshold)).unwrap();
            prop_assert!(!monitor.ingest(&t).triggered);
        }
    }
}
