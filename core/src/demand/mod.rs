//! Demand estimation
//!
//! Records observed request quantities per (agent, resource) in a bounded
//! sample window and produces quantile estimates of future maximum need.
//! The probabilistic safety check substitutes these estimates for declared
//! maxima when an agent runs in adaptive or hybrid demand mode.
//!
//! # Fail-safe
//!
//! Below `min_samples` observations the estimator refuses to guess and
//! returns the declared max, so a cold start can never loosen the safety
//! check.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::config::AdaptiveConfig;
use crate::models::agent::DemandMode;
use crate::models::{AgentId, ResourceId};

/// Summary statistics over one sample window
///
/// # Example
/// ```
/// use agent_warden_core_rs::UsageStats;
///
/// let stats = UsageStats::from_samples(vec![2, 4, 4, 4, 5, 5, 7, 9]);
/// assert!((stats.mean() - 5.0).abs() < 1e-9);
/// assert!((stats.stddev() - 2.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    samples: Vec<u64>,
}

impl UsageStats {
    /// Build stats over an explicit sample set
    pub fn from_samples(samples: Vec<u64>) -> Self {
        Self { samples }
    }

    /// Number of recorded samples
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Arithmetic mean (0.0 when empty)
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<u64>() as f64 / self.samples.len() as f64
    }

    /// Population variance (0.0 when empty)
    pub fn variance(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        self.samples
            .iter()
            .map(|&sample| {
                let delta = sample as f64 - mean;
                delta * delta
            })
            .sum::<f64>()
            / self.samples.len() as f64
    }

    /// Population standard deviation (0.0 when empty)
    pub fn stddev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Empirical quantile at `q` in (0, 1], nearest-rank (`None` when empty)
    pub fn quantile(&self, q: f64) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted = self.samples.clone();
        sorted.sort_unstable();
        Some(sorted[quantile_index(sorted.len(), q)])
    }
}

/// Nearest-rank index for quantile `q` over `len` sorted samples
pub(crate) fn quantile_index(len: usize, q: f64) -> usize {
    let clamped = q.clamp(0.0, 1.0);
    let rank = (clamped * len as f64).ceil() as usize;
    rank.saturating_sub(1).min(len - 1)
}

/// Statistical predictor of per-agent per-resource maximum need
pub struct DemandEstimator {
    /// Sample windows, bounded by `history_window_size`
    windows: BTreeMap<(AgentId, ResourceId), VecDeque<u64>>,

    /// Per-agent demand mode (default `Static`)
    modes: BTreeMap<AgentId, DemandMode>,

    window_size: usize,
    min_samples: usize,
}

impl DemandEstimator {
    pub fn new(config: &AdaptiveConfig) -> Self {
        Self {
            windows: BTreeMap::new(),
            modes: BTreeMap::new(),
            window_size: config.history_window_size.max(1),
            min_samples: config.min_samples,
        }
    }

    /// Record one observed request quantity
    pub fn record_request(&mut self, agent: AgentId, resource: ResourceId, quantity: u64) {
        let window = self.windows.entry((agent, resource)).or_default();
        if window.len() == self.window_size {
            window.pop_front();
        }
        window.push_back(quantity);
    }

    /// Estimate the maximum need at the given confidence level
    ///
    /// Returns the empirical quantile of the sample window, clamped to at
    /// least the current allocation and at most the resource capacity.
    /// With fewer than `min_samples` observations, returns `declared_max`.
    pub fn estimate_max_need(
        &self,
        agent: AgentId,
        resource: ResourceId,
        confidence: f64,
        declared_max: u64,
        current_allocation: u64,
        capacity: u64,
    ) -> u64 {
        let quantile = self
            .windows
            .get(&(agent, resource))
            .filter(|window| window.len() >= self.min_samples)
            .map(|window| {
                let mut sorted: Vec<u64> = window.iter().copied().collect();
                sorted.sort_unstable();
                sorted[quantile_index(sorted.len(), confidence)]
            });

        match quantile {
            Some(estimate) => estimate.max(current_allocation).min(capacity),
            None => declared_max,
        }
    }

    /// Sorted copy of the sample window, if it has reached `min_samples`
    ///
    /// The probabilistic safety check caches these per sweep so its binary
    /// search over confidence levels does not re-sort.
    pub fn sorted_samples(&self, agent: AgentId, resource: ResourceId) -> Option<Vec<u64>> {
        self.windows
            .get(&(agent, resource))
            .filter(|window| window.len() >= self.min_samples)
            .map(|window| {
                let mut sorted: Vec<u64> = window.iter().copied().collect();
                sorted.sort_unstable();
                sorted
            })
    }

    /// Summary statistics for one (agent, resource) window
    pub fn usage_stats(&self, agent: AgentId, resource: ResourceId) -> UsageStats {
        UsageStats::from_samples(
            self.windows
                .get(&(agent, resource))
                .map(|window| window.iter().copied().collect())
                .unwrap_or_default(),
        )
    }

    /// Set an agent's demand mode
    pub fn set_agent_demand_mode(&mut self, agent: AgentId, mode: DemandMode) {
        self.modes.insert(agent, mode);
    }

    /// Get an agent's demand mode (default `Static`)
    pub fn get_agent_demand_mode(&self, agent: AgentId) -> DemandMode {
        self.modes.get(&agent).copied().unwrap_or(DemandMode::Static)
    }

    /// Drop all state for a deregistered agent
    pub fn remove_agent(&mut self, agent: AgentId) {
        self.windows.retain(|&(owner, _), _| owner != agent);
        self.modes.remove(&agent);
    }
}
