//! Traffic flows and the flow registry

use crate::error::{PathError, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Dominant performance concern of a flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    /// Minimize propagation delay
    Latency,
    /// Prefer wide bottleneck links
    Throughput,
    /// Minimize loss and jitter
    Reliability,
    /// Minimum hop count
    #[default]
    Unspecified,
}

impl Sensitivity {
    /// All sensitivities
    pub const ALL: [Sensitivity; 4] = [
        Sensitivity::Latency,
        Sensitivity::Throughput,
        Sensitivity::Reliability,
        Sensitivity::Unspecified,
    ];

    /// Lowercase tag
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Latency => "latency",
            Self::Throughput => "throughput",
            Self::Reliability => "reliability",
            Self::Unspecified => "unspecified",
        }
    }
}

impl fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sensitivity {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "latency" => Ok(Self::Latency),
            "throughput" => Ok(Self::Throughput),
            "reliability" => Ok(Self::Reliability),
            "unspecified" => Ok(Self::Unspecified),
            other => Err(PathError::Validation(format!("unknown sensitivity: {}", other))),
        }
    }
}

/// A traffic flow needing a path through the overlay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficFlow {
    /// Source site
    pub source: String,
    /// Destination site
    pub destination: String,
    /// Required bandwidth in Mbps
    pub required_bandwidth: f64,
    /// 1 (highest) to 5 (lowest); advisory only
    pub priority: u8,
    /// Performance sensitivity
    pub sensitivity: Sensitivity,
}

impl TrafficFlow {
    /// Create a flow
    pub fn new(
        source: &str,
        destination: &str,
        required_bandwidth: f64,
        priority: u8,
        sensitivity: Sensitivity,
    ) -> Self {
        Self {
            source: source.to_string(),
            destination: destination.to_string(),
            required_bandwidth,
            priority,
            sensitivity,
        }
    }

    /// Check attribute ranges
    pub fn validate(&self) -> Result<()> {
        if !self.required_bandwidth.is_finite() || self.required_bandwidth <= 0.0 {
            return Err(PathError::Validation(format!(
                "required_bandwidth must be finite and > 0, got {}",
                self.required_bandwidth
            )));
        }
        if !(1..=5).contains(&self.priority) {
            return Err(PathError::Validation(format!(
                "priority must be within 1-5, got {}",
                self.priority
            )));
        }
        Ok(())
    }
}

/// Flow registry keyed by flow id
///
/// Registration is last-write-wins: reusing an id replaces the earlier flow.
#[derive(Debug, Default)]
pub struct FlowRegistry {
    flows: DashMap<String, TrafficFlow>,
}

impl FlowRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a flow, returning the one it replaced
    pub fn register(&self, id: &str, flow: TrafficFlow) -> Result<Option<TrafficFlow>> {
        flow.validate()?;
        let previous = self.flows.insert(id.to_string(), flow);
        if previous.is_some() {
            warn!("Flow {} re-registered, previous definition replaced", id);
        }
        Ok(previous)
    }

    /// Look up a flow
    pub fn get(&self, id: &str) -> Result<TrafficFlow> {
        self.flows
            .get(id)
            .map(|f| f.value().clone())
            .ok_or_else(|| PathError::UnknownFlow(id.to_string()))
    }

    /// Remove a flow
    pub fn remove(&self, id: &str) -> Result<TrafficFlow> {
        self.flows
            .remove(id)
            .map(|(_, flow)| flow)
            .ok_or_else(|| PathError::UnknownFlow(id.to_string()))
    }

    /// Whether the id is registered
    pub fn contains(&self, id: &str) -> bool {
        self.flows.contains_key(id)
    }

    /// Number of flows
    pub fn len(&self) -> usize {
        self.flows.len()
    }

    /// True when empty
    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Copy of all flows, sorted by id
    pub fn snapshot(&self) -> Vec<(String, TrafficFlow)> {
        let mut flows: Vec<_> = self
            .flows
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        flows.sort_by(|a, b| a.0.cmp(&b.0));
        flows
    }
}
