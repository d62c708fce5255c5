//! Topology store: sites, undirected links and their measured quality
//!
//! [`Topology`] is a plain graph value. [`TopologyStore`] is the shared
//! handle the controller and the drift monitor hold; every mutation goes
//! through its write lock so a reader never sees a half-merged link record.

use crate::error::{PathError, Result};
use crate::telemetry::LinkSample;
use parking_lot::{RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Informational site role, never consulted by path selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Hub / headquarters
    Hub,
    /// Customer premises edge
    Cpe,
    /// Cloud gateway
    Cloud,
}

/// Measured link quality
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// One-way latency in ms
    pub latency: f64,
    /// Jitter in ms
    pub jitter: f64,
    /// Packet loss percentage (0-100)
    pub packet_loss: f64,
    /// Bandwidth in Mbps
    pub bandwidth: f64,
    /// Unitless preference cost
    pub cost: f64,
}

impl Link {
    /// Create a link record
    pub const fn new(latency: f64, jitter: f64, packet_loss: f64, bandwidth: f64, cost: f64) -> Self {
        Self {
            latency,
            jitter,
            packet_loss,
            bandwidth,
            cost,
        }
    }

    /// Reject metrics that would corrupt downstream path scores
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("latency", self.latency),
            ("jitter", self.jitter),
            ("packet_loss", self.packet_loss),
            ("bandwidth", self.bandwidth),
            ("cost", self.cost),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(PathError::Validation(format!("{} must be finite, got {}", name, value)));
        }
        if self.latency < 0.0 {
            return Err(PathError::Validation(format!("latency must be >= 0, got {}", self.latency)));
        }
        if self.jitter < 0.0 {
            return Err(PathError::Validation(format!("jitter must be >= 0, got {}", self.jitter)));
        }
        if !(0.0..=100.0).contains(&self.packet_loss) {
            return Err(PathError::Validation(format!(
                "packet_loss must be within 0-100%, got {}",
                self.packet_loss
            )));
        }
        if self.bandwidth <= 0.0 {
            return Err(PathError::Validation(format!("bandwidth must be > 0, got {}", self.bandwidth)));
        }
        if self.cost < 0.0 {
            return Err(PathError::Validation(format!("cost must be >= 0, got {}", self.cost)));
        }
        Ok(())
    }
}

/// Partial link metrics; unset fields keep their current value
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkUpdate {
    /// New latency (ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<f64>,
    /// New jitter (ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jitter: Option<f64>,
    /// New packet loss (%)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packet_loss: Option<f64>,
    /// New bandwidth (Mbps)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<f64>,
    /// New monetary cost
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

impl LinkUpdate {
    /// Empty update
    pub fn new() -> Self {
        Self::default()
    }

    /// Set latency
    pub fn latency(mut self, value: f64) -> Self {
        self.latency = Some(value);
        self
    }

    /// Set jitter
    pub fn jitter(mut self, value: f64) -> Self {
        self.jitter = Some(value);
        self
    }

    /// Set packet loss
    pub fn packet_loss(mut self, value: f64) -> Self {
        self.packet_loss = Some(value);
        self
    }

    /// Set bandwidth
    pub fn bandwidth(mut self, value: f64) -> Self {
        self.bandwidth = Some(value);
        self
    }

    /// Set cost
    pub fn cost(mut self, value: f64) -> Self {
        self.cost = Some(value);
        self
    }

    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        self.latency.is_none()
            && self.jitter.is_none()
            && self.packet_loss.is_none()
            && self.bandwidth.is_none()
            && self.cost.is_none()
    }

    /// Produce the merged record without touching `link`
    pub fn merge_into(&self, link: &Link) -> Link {
        Link {
            latency: self.latency.unwrap_or(link.latency),
            jitter: self.jitter.unwrap_or(link.jitter),
            packet_loss: self.packet_loss.unwrap_or(link.packet_loss),
            bandwidth: self.bandwidth.unwrap_or(link.bandwidth),
            cost: self.cost.unwrap_or(link.cost),
        }
    }
}

/// Unordered node pair, normalized so that `a <= b`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeKey {
    a: String,
    b: String,
}

impl EdgeKey {
    /// Build a key; argument order does not matter
    pub fn new(x: &str, y: &str) -> Self {
        let (a, b) = if x <= y { (x, y) } else { (y, x) };
        Self {
            a: a.to_string(),
            b: b.to_string(),
        }
    }

    /// Both endpoints, smaller id first
    pub fn endpoints(&self) -> (&str, &str) {
        (&self.a, &self.b)
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<->{}", self.a, self.b)
    }
}

/// Overlay graph of sites and links
#[derive(Debug, Clone, Default)]
pub struct Topology {
    nodes: BTreeMap<String, NodeRole>,
    adjacency: BTreeMap<String, BTreeSet<String>>,
    links: BTreeMap<EdgeKey, Link>,
}

impl Topology {
    /// Empty topology
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a site
    pub fn add_node(&mut self, id: &str, role: NodeRole) -> Result<()> {
        if self.nodes.contains_key(id) {
            return Err(PathError::DuplicateNode(id.to_string()));
        }
        self.nodes.insert(id.to_string(), role);
        self.adjacency.insert(id.to_string(), BTreeSet::new());
        Ok(())
    }

    /// Connect two existing sites
    pub fn add_link(&mut self, a: &str, b: &str, link: Link) -> Result<()> {
        self.ensure_node(a)?;
        self.ensure_node(b)?;
        if a == b {
            return Err(PathError::Validation(format!("self-loop on {}", a)));
        }
        let key = EdgeKey::new(a, b);
        if self.links.contains_key(&key) {
            return Err(PathError::DuplicateLink {
                a: a.to_string(),
                b: b.to_string(),
            });
        }
        link.validate()?;

        self.links.insert(key, link);
        if let Some(adj) = self.adjacency.get_mut(a) {
            adj.insert(b.to_string());
        }
        if let Some(adj) = self.adjacency.get_mut(b) {
            adj.insert(a.to_string());
        }
        Ok(())
    }

    /// Merge partial metrics into an existing link
    ///
    /// The merged record is validated before it replaces the old one, so a
    /// rejected update leaves the link untouched.
    pub fn update_link_metrics(&mut self, a: &str, b: &str, update: &LinkUpdate) -> Result<Link> {
        let link = self
            .links
            .get_mut(&EdgeKey::new(a, b))
            .ok_or_else(|| PathError::link_not_found(a, b))?;

        let merged = update.merge_into(link);
        merged.validate()?;
        *link = merged;

        debug!("Updated link {} <-> {}: {:?}", a, b, merged);
        Ok(merged)
    }

    /// Apply a batch of partial updates, all or nothing
    pub fn apply_updates(&mut self, batch: &[LinkSample]) -> Result<usize> {
        let mut staged: BTreeMap<EdgeKey, Link> = BTreeMap::new();

        for sample in batch {
            let key = EdgeKey::new(&sample.a, &sample.b);
            let current = match staged.get(&key) {
                Some(link) => *link,
                None => *self
                    .links
                    .get(&key)
                    .ok_or_else(|| PathError::link_not_found(&sample.a, &sample.b))?,
            };
            let merged = sample.update.merge_into(&current);
            merged.validate()?;
            staged.insert(key, merged);
        }

        let count = staged.len();
        for (key, link) in staged {
            self.links.insert(key, link);
        }
        debug!("Applied {} link updates across {} links", batch.len(), count);
        Ok(count)
    }

    /// Neighbours of a site, in id order
    pub fn neighbors(&self, id: &str) -> Result<impl Iterator<Item = &str> + '_> {
        self.adjacency
            .get(id)
            .map(|adj| adj.iter().map(String::as_str))
            .ok_or_else(|| PathError::UnknownNode(id.to_string()))
    }

    /// Link record between two sites
    pub fn link_between(&self, a: &str, b: &str) -> Result<&Link> {
        self.links
            .get(&EdgeKey::new(a, b))
            .ok_or_else(|| PathError::link_not_found(a, b))
    }

    /// Whether the site exists
    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Role tag of a site
    pub fn node_role(&self, id: &str) -> Result<NodeRole> {
        self.nodes
            .get(id)
            .copied()
            .ok_or_else(|| PathError::UnknownNode(id.to_string()))
    }

    /// All sites, in id order
    pub fn nodes(&self) -> impl Iterator<Item = (&str, NodeRole)> + '_ {
        self.nodes.iter().map(|(id, role)| (id.as_str(), *role))
    }

    /// All links, in edge-key order
    pub fn links(&self) -> impl Iterator<Item = (&EdgeKey, &Link)> + '_ {
        self.links.iter()
    }

    /// Number of sites
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of links
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub(crate) fn ensure_node(&self, id: &str) -> Result<()> {
        if self.nodes.contains_key(id) {
            Ok(())
        } else {
            Err(PathError::UnknownNode(id.to_string()))
        }
    }
}

/// Shared, lock-protected topology handle
#[derive(Debug, Clone, Default)]
pub struct TopologyStore {
    inner: Arc<RwLock<Topology>>,
}

impl TopologyStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing topology
    pub fn from_topology(topology: Topology) -> Self {
        Self {
            inner: Arc::new(RwLock::new(topology)),
        }
    }

    /// Add a site
    pub fn add_node(&self, id: &str, role: NodeRole) -> Result<()> {
        self.inner.write().add_node(id, role)
    }

    /// Add a link
    pub fn add_link(&self, a: &str, b: &str, link: Link) -> Result<()> {
        self.inner.write().add_link(a, b, link)
    }

    /// Merge partial metrics into one link atomically
    pub fn update_link_metrics(&self, a: &str, b: &str, update: &LinkUpdate) -> Result<Link> {
        self.inner.write().update_link_metrics(a, b, update)
    }

    /// Apply a batch of updates under one write lock
    pub fn apply_updates(&self, batch: &[LinkSample]) -> Result<usize> {
        self.inner.write().apply_updates(batch)
    }

    /// Neighbours of a site, copied out of the lock
    pub fn neighbors(&self, id: &str) -> Result<Vec<String>> {
        let topology = self.inner.read();
        let neighbors = topology.neighbors(id)?.map(str::to_string).collect();
        Ok(neighbors)
    }

    /// Link record between two sites, copied out of the lock
    pub fn link_between(&self, a: &str, b: &str) -> Result<Link> {
        self.inner.read().link_between(a, b).copied()
    }

    /// Hold a read guard; writers block until it is dropped
    pub fn read(&self) -> RwLockReadGuard<'_, Topology> {
        self.inner.read()
    }

    /// Owned copy of the current topology
    pub fn snapshot(&self) -> Topology {
        self.inner.read().clone()
    }
}
