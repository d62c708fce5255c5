//! Overlay Path Selection & Drift Reoptimization
//!
//! Picks, for every traffic flow, the overlay path that minimizes a
//! sensitivity-specific cost, scores the resulting path quality, and
//! recomputes all paths once link metrics drift far enough from the last
//! decision point.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  telemetry feed ──► Reoptimizer ──► DriftMonitor (snapshot/diff) │
//! │                          │                                       │
//! │                          ▼ drift >= threshold                    │
//! │  ┌──────────────┐  ┌────────────────┐  ┌──────────────────────┐  │
//! │  │ FlowRegistry │─►│ SdwanController│─►│ PathScorer (Dijkstra)│  │
//! │  └──────────────┘  └───────┬────────┘  └──────────────────────┘  │
//! │                            ▼                                     │
//! │                   TopologyStore (RwLock)                         │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use sdwan_path::{Link, NodeRole, SdwanController, Sensitivity, TrafficFlow};
//!
//! let controller = SdwanController::new();
//! controller.add_node("HQ", NodeRole::Hub).unwrap();
//! controller.add_node("Branch1", NodeRole::Cpe).unwrap();
//! controller.add_link("HQ", "Branch1", Link::new(30.0, 5.0, 0.1, 50.0, 1.0)).unwrap();
//! controller
//!     .register_flow("voip1", TrafficFlow::new("Branch1", "HQ", 0.5, 1, Sensitivity::Latency))
//!     .unwrap();
//!
//! let evaluation = controller.evaluate_all();
//! let voip = evaluation.get("voip1").and_then(|o| o.result()).unwrap();
//! assert_eq!(voip.path, vec!["Branch1", "HQ"]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod controller;
pub mod drift;
pub mod error;
pub mod flow;
pub mod scorer;
pub mod telemetry;
pub mod topology;

pub use config::{BaselinePolicy, ControllerConfig, DriftConfig, ScoringWeights};
pub use controller::{ControllerStats, Evaluation, FlowOutcome, SdwanController};
pub use drift::{DriftDecision, DriftMonitor, DriftSnapshot, EdgeSample, Reoptimizer, ReoptimizerStats};
pub use error::{ErrorKind, PathError, Result};
pub use flow::{FlowRegistry, Sensitivity, TrafficFlow};
pub use scorer::{best_path, PathMetrics, PathResult, PathScorer};
pub use telemetry::{LinkSample, MetricsSource, ScriptedSource};
pub use topology::{EdgeKey, Link, LinkUpdate, NodeRole, Topology, TopologyStore};
