//! Controller configuration

use crate::error::{PathError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Coefficients for edge weights and path scores
///
/// Defaults reproduce the stock formulas:
/// - latency: `100 - 0.5*latency - 0.3*jitter`
/// - reliability: `100 - 2*loss - 0.5*jitter`, edge weight `loss + 0.1*jitter`
/// - unspecified: neutral `100`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Jitter factor in the reliability edge weight
    pub reliability_edge_jitter: f64,
    /// Latency penalty in the latency score
    pub latency_score_latency: f64,
    /// Jitter penalty in the latency score
    pub latency_score_jitter: f64,
    /// Loss penalty in the reliability score
    pub reliability_score_loss: f64,
    /// Jitter penalty in the reliability score
    pub reliability_score_jitter: f64,
    /// Score reported for flows with no stated sensitivity
    pub unspecified_score: f64,
}

impl ScoringWeights {
    /// Stock coefficients
    pub const DEFAULT: Self = Self {
        reliability_edge_jitter: 0.1,
        latency_score_latency: 0.5,
        latency_score_jitter: 0.3,
        reliability_score_loss: 2.0,
        reliability_score_jitter: 0.5,
        unspecified_score: 100.0,
    };

    /// Coefficients must be finite and non-negative so edge weights stay
    /// usable by a shortest-path search
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("reliability_edge_jitter", self.reliability_edge_jitter),
            ("latency_score_latency", self.latency_score_latency),
            ("latency_score_jitter", self.latency_score_jitter),
            ("reliability_score_loss", self.reliability_score_loss),
            ("reliability_score_jitter", self.reliability_score_jitter),
            ("unspecified_score", self.unspecified_score),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(PathError::Config(format!(
                    "{} must be finite and >= 0, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// When the drift baseline advances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselinePolicy {
    /// Every ingested snapshot becomes the next baseline
    #[default]
    Always,
    /// Baseline only moves when a reoptimization fires, so slow drift accumulates
    OnTrigger,
}

/// Drift monitor settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriftConfig {
    /// Cumulative absolute change that triggers reoptimization
    pub threshold: f64,
    /// Baseline advancement rule
    #[serde(default)]
    pub baseline: BaselinePolicy,
}

impl DriftConfig {
    /// Create with the given threshold and the default baseline policy
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            baseline: BaselinePolicy::default(),
        }
    }

    /// Override the baseline policy
    pub fn with_baseline(mut self, baseline: BaselinePolicy) -> Self {
        self.baseline = baseline;
        self
    }

    /// Threshold must be finite and non-negative
    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(PathError::Config(format!(
                "drift threshold must be finite and >= 0, got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

/// Full controller configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Drift monitor settings
    pub drift: DriftConfig,
    /// Scoring coefficients
    #[serde(default)]
    pub weights: ScoringWeights,
}

impl ControllerConfig {
    /// Create with the given drift threshold and stock weights
    pub fn new(threshold: f64) -> Self {
        Self {
            drift: DriftConfig::new(threshold),
            weights: ScoringWeights::default(),
        }
    }

    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse and validate JSON
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(content).map_err(|e| PathError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| PathError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate all sections
    pub fn validate(&self) -> Result<()> {
        self.drift.validate()?;
        self.weights.validate()
    }
}
