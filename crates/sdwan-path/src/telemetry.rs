//! Telemetry injection seam
//!
//! Link measurements originate outside the core. A feed hands batches of
//! [`LinkSample`]s to the reoptimizer, which writes them through the normal
//! update path before checking drift.

use crate::topology::{LinkUpdate, Topology};
use serde::{Deserialize, Serialize};

/// One measured update for one link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkSample {
    /// First endpoint
    pub a: String,
    /// Second endpoint
    pub b: String,
    /// Fields that changed
    pub update: LinkUpdate,
}

impl LinkSample {
    /// Create a sample
    pub fn new(a: &str, b: &str, update: LinkUpdate) -> Self {
        Self {
            a: a.to_string(),
            b: b.to_string(),
            update,
        }
    }
}

/// Source of link measurements (probe collector, simulator, replay file)
pub trait MetricsSource {
    /// Produce the next batch given the current topology state
    fn sample(&mut self, topology: &Topology) -> Vec<LinkSample>;
}

/// Replays a fixed sequence of batches, then yields empty batches
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    batches: std::collections::VecDeque<Vec<LinkSample>>,
}

impl ScriptedSource {
    /// Create from an ordered list of batches
    pub fn new(batches: Vec<Vec<LinkSample>>) -> Self {
        Self {
            batches: batches.into(),
        }
    }

    /// Batches not yet replayed
    pub fn remaining(&self) -> usize {
        self.batches.len()
    }
}

impl MetricsSource for ScriptedSource {
    fn sample(&mut self, _topology: &Topology) -> Vec<LinkSample> {
        self.batches.pop_front().unwrap_or_default()
    }
}
