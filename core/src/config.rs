//! Manager configuration
//!
//! All tunables live here. Construction uses struct-update syntax over
//! `Config::default()`; sub-configs for progress tracking, delegation, and
//! adaptive demand estimation nest as their own structs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What to do when a reported delegation would create a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleAction {
    /// Refuse the new edge and report the cycle path
    RejectDelegation,

    /// Drop the most recently added edge on the cycle, then accept
    BreakCycle,

    /// Accept the edge and fire `DelegationCycleDetected`
    AllowButWarn,
}

/// Stall detection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Enable the progress tracker and stall sweep
    pub enabled: bool,

    /// Stall threshold for agents without a per-agent override
    pub default_stall_threshold: Duration,

    /// Minimum interval between stall sweeps
    pub check_interval: Duration,

    /// Release everything a stalled agent holds
    pub auto_release_on_stall: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            default_stall_threshold: Duration::from_secs(30),
            check_interval: Duration::from_secs(1),
            auto_release_on_stall: false,
        }
    }
}

/// Delegation graph settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationConfig {
    /// Enable cycle detection on reported delegations
    pub enabled: bool,

    /// How to handle a would-be cycle
    pub cycle_action: CycleAction,
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cycle_action: CycleAction::RejectDelegation,
        }
    }
}

/// Adaptive demand estimation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    /// Enable probabilistic safety checks for adaptive/hybrid agents
    pub enabled: bool,

    /// Confidence level used when the caller does not supply one, in (0, 1]
    pub default_confidence_level: f64,

    /// Bounded sample window per (agent, resource)
    pub history_window_size: usize,

    /// Below this many samples, estimates fall back to the declared max
    pub min_samples: usize,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            default_confidence_level: 0.95,
            history_window_size: 100,
            min_samples: 5,
        }
    }
}

/// Top-level manager configuration
///
/// # Example
/// ```
/// use std::time::Duration;
/// use agent_warden_core_rs::Config;
///
/// let config = Config {
///     default_request_timeout: Some(Duration::from_secs(2)),
///     processor_poll_interval: Duration::from_millis(10),
///     ..Config::default()
/// };
/// assert!(config.thread_safe);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Hard cap on registered agents
    pub max_agents: usize,

    /// Reject a second agent with an already-registered name
    pub unique_agent_names: bool,

    /// Spawn the background processor thread; `false` elides it for
    /// strictly serial embedding (the caller drives `process_pending`)
    pub thread_safe: bool,

    /// Fallback timeout applied to requests submitted without one
    /// (`None` means requests without a timeout never expire)
    pub default_request_timeout: Option<Duration>,

    /// Background processor wake interval
    pub processor_poll_interval: Duration,

    /// Periodic snapshot interval (zero disables periodic snapshots)
    pub snapshot_interval: Duration,

    /// Pending queue capacity (zero means unbounded)
    pub pending_queue_capacity: usize,

    /// Stall detection
    pub progress: ProgressConfig,

    /// Delegation cycle handling
    pub delegation: DelegationConfig,

    /// Adaptive demand estimation
    pub adaptive: AdaptiveConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_agents: 256,
            unique_agent_names: true,
            thread_safe: true,
            default_request_timeout: None,
            processor_poll_interval: Duration::from_millis(10),
            snapshot_interval: Duration::from_millis(100),
            pending_queue_capacity: 0, // unbounded
            progress: ProgressConfig::default(),
            delegation: DelegationConfig::default(),
            adaptive: AdaptiveConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.max_agents > 0);
        assert!(config.thread_safe);
        assert_eq!(config.pending_queue_capacity, 0);
        assert_eq!(config.delegation.cycle_action, CycleAction::RejectDelegation);
        assert!(!config.progress.enabled);
        assert!(!config.adaptive.enabled);
        assert!(config.adaptive.default_confidence_level > 0.0);
        assert!(config.adaptive.history_window_size > 0);
    }
}
