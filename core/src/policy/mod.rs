//! Scheduling policies
//!
//! Policies order the pending queue for the background processor; they
//! never grant or deny. The processor walks the returned order and probes
//! each request against availability and the safety checker.
//!
//! # Policy Interface
//!
//! All policies implement the `SchedulingPolicy` trait:
//! ```rust
//! use agent_warden_core_rs::policy::{PendingView, SchedulingPolicy};
//! use agent_warden_core_rs::RequestId;
//!
//! struct MyPolicy;
//!
//! impl SchedulingPolicy for MyPolicy {
//!     fn name(&self) -> &str {
//!         "my_policy"
//!     }
//!
//!     fn order(&mut self, pending: &[PendingView]) -> Vec<RequestId> {
//!         pending.iter().map(|view| view.request_id).collect()
//!     }
//! }
//! ```
//!
//! Available policies:
//! 1. **Fifo**: strict submission order (baseline)
//! 2. **Priority**: descending agent priority
//! 3. **ShortestNeed**: smallest remaining need first
//! 4. **Deadline**: earliest deadline first, no-deadline last
//! 5. **Fairness**: weighted round-robin, favoring agents granted least

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::models::{AgentId, RequestId};

pub mod deadline;
pub mod fairness;
pub mod fifo;
pub mod priority;
pub mod shortest_need;

pub use deadline::DeadlinePolicy;
pub use fairness::FairnessPolicy;
pub use fifo::FifoPolicy;
pub use priority::PriorityPolicy;
pub use shortest_need::ShortestNeedPolicy;

/// Read-only view of one pending request, handed to policies
#[derive(Debug, Clone)]
pub struct PendingView {
    pub request_id: RequestId,
    pub agent_id: AgentId,

    /// Effective priority (agent priority unless overridden per request)
    pub priority: u32,

    /// Submission order, strictly increasing
    pub submitted_seq: u64,

    /// Agent's remaining need summed over the requested resources
    pub remaining_need: u64,

    /// Absolute deadline, if the request has one
    pub deadline: Option<Instant>,

    /// Units granted to this agent so far, across all resources
    pub cumulative_granted: u64,
}

/// A pure ordering over the pending queue
pub trait SchedulingPolicy: Send {
    /// Policy name, for diagnostics
    fn name(&self) -> &str;

    /// Return request ids in the order they should be attempted
    fn order(&mut self, pending: &[PendingView]) -> Vec<RequestId>;
}

/// Policy selection for the manager
///
/// Determines which ordering the background processor applies to the
/// pending queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyConfig {
    /// Strict submission order (baseline)
    Fifo,

    /// Descending agent priority, FIFO within a priority level
    Priority,

    /// Smallest remaining need first
    ShortestNeed,

    /// Earliest deadline first, requests without a deadline last
    Deadline,

    /// Weighted round-robin across agents
    Fairness,
}

impl PolicyConfig {
    /// Build the policy object for this selection
    pub fn build(self) -> Box<dyn SchedulingPolicy> {
        match self {
            PolicyConfig::Fifo => Box::new(FifoPolicy::new()),
            PolicyConfig::Priority => Box::new(PriorityPolicy::new()),
            PolicyConfig::ShortestNeed => Box::new(ShortestNeedPolicy::new()),
            PolicyConfig::Deadline => Box::new(DeadlinePolicy::new()),
            PolicyConfig::Fairness => Box::new(FairnessPolicy::new()),
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig::Fifo
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_builds_each_policy() {
        let configs = [
            PolicyConfig::Fifo,
            PolicyConfig::Priority,
            PolicyConfig::ShortestNeed,
            PolicyConfig::Deadline,
            PolicyConfig::Fairness,
        ];
        let names: Vec<String> = configs
            .iter()
            .map(|config| config.build().name().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["fifo", "priority", "shortest_need", "deadline", "fairness"]
        );
    }
}
