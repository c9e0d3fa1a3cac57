//! Safety checker
//!
//! A pure Banker's-style feasibility oracle: given totals, availables,
//! allocations, and declared maxima, decide whether the global allocation
//! admits at least one order in which every agent can run to completion.
//!
//! # Determinism
//!
//! All state flows through `BTreeMap`s and eligible agents are always
//! selected in ascending agent id, so the returned safe sequence is a
//! deterministic function of the input.
//!
//! # Example
//! ```
//! use agent_warden_core_rs::{SafetyChecker, SafetyCheckInput};
//!
//! let input = SafetyCheckInput {
//!     total: [(1, 10)].into_iter().collect(),
//!     available: [(1, 5)].into_iter().collect(),
//!     allocation: [(0, [(1, 3)].into_iter().collect()), (1, [(1, 2)].into_iter().collect())]
//!         .into_iter()
//!         .collect(),
//!     max_need: [(0, [(1, 7)].into_iter().collect()), (1, [(1, 4)].into_iter().collect())]
//!         .into_iter()
//!         .collect(),
//! };
//!
//! let result = SafetyChecker::check_safety(&input);
//! assert!(result.is_safe);
//! assert_eq!(result.safe_sequence, vec![0, 1]);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::demand::{quantile_index, DemandEstimator};
use crate::models::agent::DemandMode;
use crate::models::{AgentId, ResourceId};

/// Tolerance for the `max_safe_confidence` binary search
const CONFIDENCE_TOLERANCE: f64 = 1e-3;

/// Input to a safety check: the full allocation state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SafetyCheckInput {
    /// Total capacity per resource
    pub total: BTreeMap<ResourceId, u64>,

    /// Available units per resource
    pub available: BTreeMap<ResourceId, u64>,

    /// Units held, per agent per resource
    pub allocation: BTreeMap<AgentId, BTreeMap<ResourceId, u64>>,

    /// Declared maximum need, per agent per resource
    pub max_need: BTreeMap<AgentId, BTreeMap<ResourceId, u64>>,
}

impl SafetyCheckInput {
    /// Union of agents appearing in the allocation or max-need tables,
    /// in ascending id order
    fn agents(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.allocation.keys().copied().collect();
        for &id in self.max_need.keys() {
            if !self.allocation.contains_key(&id) {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        ids
    }

    fn allocation_of(&self, agent: AgentId, resource: ResourceId) -> u64 {
        self.allocation
            .get(&agent)
            .and_then(|row| row.get(&resource))
            .copied()
            .unwrap_or(0)
    }

    fn max_need_of(&self, agent: AgentId, resource: ResourceId) -> u64 {
        self.max_need
            .get(&agent)
            .and_then(|row| row.get(&resource))
            .copied()
            .unwrap_or(0)
    }
}

/// Verdict of a safety check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyCheckResult {
    pub is_safe: bool,

    /// One completion order over all agents (empty when unsafe)
    pub safe_sequence: Vec<AgentId>,

    /// Human-readable explanation of the verdict
    pub reason: String,
}

impl SafetyCheckResult {
    fn unsafe_with(reason: String) -> Self {
        Self {
            is_safe: false,
            safe_sequence: Vec::new(),
            reason,
        }
    }
}

/// Verdict of a probabilistic safety check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilisticSafetyResult {
    pub is_safe: bool,

    /// Confidence level the check was asked for
    pub confidence_level: f64,

    /// Largest confidence `c' <= confidence_level` at which the projected
    /// state is still safe (0.0 if none)
    pub max_safe_confidence: f64,

    pub safe_sequence: Vec<AgentId>,
    pub reason: String,

    /// The projected maxima the verdict was computed against
    pub estimated_max_needs: BTreeMap<AgentId, BTreeMap<ResourceId, u64>>,
}

/// Banker's-style feasibility oracle
pub struct SafetyChecker;

impl SafetyChecker {
    /// Decide whether the given allocation state is safe
    ///
    /// Runs the Banker's completion check: repeatedly retire the
    /// lowest-id agent whose remaining need fits inside the work vector,
    /// folding its allocation back in. Safe iff every agent retires.
    pub fn check_safety(input: &SafetyCheckInput) -> SafetyCheckResult {
        let agents = input.agents();
        let resources: Vec<ResourceId> = input.total.keys().copied().collect();

        // An allocation above the declared max makes the need negative;
        // report it instead of wrapping.
        for &agent in &agents {
            for &resource in &resources {
                let held = input.allocation_of(agent, resource);
                let max = input.max_need_of(agent, resource);
                if held > max {
                    return SafetyCheckResult::unsafe_with(format!(
                        "agent {agent} holds {held} of resource {resource}, \
                         above its declared max {max}"
                    ));
                }
            }
        }

        let mut work: BTreeMap<ResourceId, u64> = resources
            .iter()
            .map(|&resource| {
                (
                    resource,
                    input.available.get(&resource).copied().unwrap_or(0),
                )
            })
            .collect();
        let mut finished: BTreeMap<AgentId, bool> =
            agents.iter().map(|&agent| (agent, false)).collect();
        let mut sequence = Vec::with_capacity(agents.len());

        loop {
            // Ascending-id scan keeps the sequence deterministic
            let next = agents.iter().copied().find(|&agent| {
                !finished[&agent]
                    && resources.iter().all(|&resource| {
                        let need = input.max_need_of(agent, resource)
                            - input.allocation_of(agent, resource);
                        need <= work[&resource]
                    })
            });

            match next {
                Some(agent) => {
                    for &resource in &resources {
                        *work.get_mut(&resource).unwrap() +=
                            input.allocation_of(agent, resource);
                    }
                    finished.insert(agent, true);
                    sequence.push(agent);
                }
                None => break,
            }
        }

        if sequence.len() == agents.len() {
            SafetyCheckResult {
                is_safe: true,
                reason: format!("all {} agents can run to completion", agents.len()),
                safe_sequence: sequence,
            }
        } else {
            let stuck: Vec<AgentId> = agents
                .iter()
                .copied()
                .filter(|agent| !finished[agent])
                .collect();
            SafetyCheckResult::unsafe_with(format!(
                "agents {stuck:?} cannot finish with the available resources"
            ))
        }
    }

    /// Would granting `quantity` of `resource` to `agent` keep the system
    /// safe?
    ///
    /// Returns unsafe (not an error) if the grant exceeds availability or
    /// the agent's remaining need.
    pub fn check_hypothetical(
        input: &SafetyCheckInput,
        agent: AgentId,
        resource: ResourceId,
        quantity: u64,
    ) -> SafetyCheckResult {
        let demands: BTreeMap<ResourceId, u64> = [(resource, quantity)].into_iter().collect();
        Self::check_hypothetical_batch(input, agent, &demands)
    }

    /// Would atomically granting the whole demand map keep the system
    /// safe?
    pub fn check_hypothetical_batch(
        input: &SafetyCheckInput,
        agent: AgentId,
        demands: &BTreeMap<ResourceId, u64>,
    ) -> SafetyCheckResult {
        let mut projected = input.clone();
        for (&resource, &quantity) in demands {
            if quantity == 0 {
                continue;
            }
            let available = projected.available.get(&resource).copied().unwrap_or(0);
            if quantity > available {
                return SafetyCheckResult::unsafe_with(format!(
                    "requested {quantity} of resource {resource}, only {available} available"
                ));
            }
            let need =
                input.max_need_of(agent, resource).saturating_sub(input.allocation_of(agent, resource));
            if quantity > need {
                return SafetyCheckResult::unsafe_with(format!(
                    "requested {quantity} of resource {resource}, \
                     above the agent's remaining need {need}"
                ));
            }

            *projected.available.get_mut(&resource).unwrap() = available - quantity;
            *projected
                .allocation
                .entry(agent)
                .or_default()
                .entry(resource)
                .or_insert(0) += quantity;
        }
        Self::check_safety(&projected)
    }

    /// Safety check with estimator-projected maxima
    ///
    /// Replaces the declared max of every adaptive/hybrid agent with the
    /// estimator's quantile at `confidence` (hybrid takes the max of the
    /// two). `max_safe_confidence` is found by binary search over the
    /// quantile function; sample windows are sorted once per sweep.
    pub fn check_safety_probabilistic(
        input: &SafetyCheckInput,
        confidence: f64,
        estimator: &DemandEstimator,
        modes: &BTreeMap<AgentId, DemandMode>,
    ) -> ProbabilisticSafetyResult {
        let confidence = confidence.clamp(f64::MIN_POSITIVE, 1.0);
        let cache = QuantileCache::build(input, estimator, modes);

        let projected = cache.project(input, confidence);
        let result = Self::check_safety(&projected_input(input, &projected));

        let max_safe_confidence = if result.is_safe {
            confidence
        } else {
            // The projected need grows with confidence, so safety is
            // monotone: search downward for the highest safe level.
            let mut lo = 0.0_f64;
            let mut hi = confidence;
            let floor_safe = {
                let needs = cache.project(input, 0.0);
                Self::check_safety(&projected_input(input, &needs)).is_safe
            };
            if !floor_safe {
                lo = -1.0; // not safe at any confidence
            } else {
                while hi - lo > CONFIDENCE_TOLERANCE {
                    let mid = (lo + hi) / 2.0;
                    let needs = cache.project(input, mid);
                    if Self::check_safety(&projected_input(input, &needs)).is_safe {
                        lo = mid;
                    } else {
                        hi = mid;
                    }
                }
            }
            lo.max(0.0)
        };

        ProbabilisticSafetyResult {
            is_safe: result.is_safe,
            confidence_level: confidence,
            max_safe_confidence,
            safe_sequence: result.safe_sequence,
            reason: result.reason,
            estimated_max_needs: projected,
        }
    }
}

fn projected_input(
    input: &SafetyCheckInput,
    max_needs: &BTreeMap<AgentId, BTreeMap<ResourceId, u64>>,
) -> SafetyCheckInput {
    SafetyCheckInput {
        total: input.total.clone(),
        available: input.available.clone(),
        allocation: input.allocation.clone(),
        max_need: max_needs.clone(),
    }
}

/// Sorted sample windows gathered once per probabilistic sweep
struct QuantileCache {
    /// (agent, resource) -> sorted samples
    windows: BTreeMap<(AgentId, ResourceId), Vec<u64>>,
    modes: BTreeMap<AgentId, DemandMode>,
}

impl QuantileCache {
    fn build(
        input: &SafetyCheckInput,
        estimator: &DemandEstimator,
        modes: &BTreeMap<AgentId, DemandMode>,
    ) -> Self {
        let mut windows = BTreeMap::new();
        for agent in input.agents() {
            if modes.get(&agent).copied().unwrap_or(DemandMode::Static) == DemandMode::Static {
                continue;
            }
            for &resource in input.total.keys() {
                if let Some(sorted) = estimator.sorted_samples(agent, resource) {
                    windows.insert((agent, resource), sorted);
                }
            }
        }
        Self {
            windows,
            modes: modes.clone(),
        }
    }

    /// Projected max-need table at one confidence level
    fn project(
        &self,
        input: &SafetyCheckInput,
        confidence: f64,
    ) -> BTreeMap<AgentId, BTreeMap<ResourceId, u64>> {
        let mut projected = BTreeMap::new();
        for agent in input.agents() {
            let mode = self
                .modes
                .get(&agent)
                .copied()
                .unwrap_or(DemandMode::Static);
            let mut row = BTreeMap::new();
            for &resource in input.total.keys() {
                let declared = input.max_need_of(agent, resource);
                let held = input.allocation_of(agent, resource);
                let capacity = input.total[&resource];

                let estimate = self.windows.get(&(agent, resource)).map(|sorted| {
                    sorted[quantile_index(sorted.len(), confidence)]
                        .max(held)
                        .min(capacity)
                });

                let effective = match (mode, estimate) {
                    (DemandMode::Static, _) | (_, None) => declared,
                    (DemandMode::Adaptive, Some(estimate)) => estimate,
                    (DemandMode::Hybrid, Some(estimate)) => declared.max(estimate),
                };
                if effective > 0 || declared > 0 {
                    row.insert(resource, effective);
                }
            }
            projected.insert(agent, row);
        }
        projected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdaptiveConfig;

    fn input(
        total: &[(ResourceId, u64)],
        available: &[(ResourceId, u64)],
        allocation: &[(AgentId, &[(ResourceId, u64)])],
        max_need: &[(AgentId, &[(ResourceId, u64)])],
    ) -> SafetyCheckInput {
        SafetyCheckInput {
            total: total.iter().copied().collect(),
            available: available.iter().copied().collect(),
            allocation: allocation
                .iter()
                .map(|&(agent, row)| (agent, row.iter().copied().collect()))
                .collect(),
            max_need: max_need
                .iter()
                .map(|&(agent, row)| (agent, row.iter().copied().collect()))
                .collect(),
        }
    }

    #[test]
    fn test_classic_bankers_safe_state() {
        let state = input(
            &[(1, 10)],
            &[(1, 5)],
            &[(0, &[(1, 3)]), (1, &[(1, 2)])],
            &[(0, &[(1, 7)]), (1, &[(1, 4)])],
        );
        let result = SafetyChecker::check_safety(&state);
        assert!(result.is_safe);
        assert_eq!(result.safe_sequence, vec![0, 1]);
    }

    #[test]
    fn test_unsafe_state_detected() {
        // Both agents may still need 5+ units but only 1 is available
        let state = input(
            &[(1, 10)],
            &[(1, 1)],
            &[(0, &[(1, 5)]), (1, &[(1, 4)])],
            &[(0, &[(1, 10)]), (1, &[(1, 10)])],
        );
        let result = SafetyChecker::check_safety(&state);
        assert!(!result.is_safe);
        assert!(result.safe_sequence.is_empty());
        assert!(result.reason.contains("cannot finish"));
    }

    #[test]
    fn test_allocation_above_max_is_unsafe() {
        let state = input(&[(1, 10)], &[(1, 4)], &[(0, &[(1, 6)])], &[(0, &[(1, 5)])]);
        let result = SafetyChecker::check_safety(&state);
        assert!(!result.is_safe);
        assert!(result.reason.contains("declared max"));
    }

    #[test]
    fn test_empty_state_is_safe() {
        let result = SafetyChecker::check_safety(&SafetyCheckInput::default());
        assert!(result.is_safe);
        assert!(result.safe_sequence.is_empty());
    }

    #[test]
    fn test_sequence_prefers_ascending_ids_on_ties() {
        // Both agents are immediately eligible; ascending id wins
        let state = input(
            &[(1, 10)],
            &[(1, 8)],
            &[(0, &[(1, 1)]), (1, &[(1, 1)])],
            &[(0, &[(1, 2)]), (1, &[(1, 2)])],
        );
        let result = SafetyChecker::check_safety(&state);
        assert_eq!(result.safe_sequence, vec![0, 1]);
    }

    #[test]
    fn test_hypothetical_grant() {
        let state = input(
            &[(1, 10)],
            &[(1, 5)],
            &[(0, &[(1, 3)]), (1, &[(1, 2)])],
            &[(0, &[(1, 7)]), (1, &[(1, 4)])],
        );
        assert!(SafetyChecker::check_hypothetical(&state, 0, 1, 2).is_safe);
        // 5 would exceed agent 0's remaining need (7 - 3 = 4)
        assert!(!SafetyChecker::check_hypothetical(&state, 0, 1, 5).is_safe);
    }

    #[test]
    fn test_hypothetical_exceeding_availability_is_unsafe_not_error() {
        let state = input(&[(1, 10)], &[(1, 2)], &[(0, &[(1, 0)])], &[(0, &[(1, 8)])]);
        let result = SafetyChecker::check_hypothetical(&state, 0, 1, 3);
        assert!(!result.is_safe);
        assert!(result.reason.contains("available"));
    }

    #[test]
    fn test_hypothetical_batch_is_all_or_nothing() {
        let state = input(
            &[(1, 10), (2, 20)],
            &[(1, 10), (2, 3)],
            &[(0, &[])],
            &[(0, &[(1, 5), (2, 10)])],
        );
        // Resource 2 has only 3 available, so the combined grant fails
        let demands: BTreeMap<ResourceId, u64> = [(1, 2), (2, 5)].into_iter().collect();
        let result = SafetyChecker::check_hypothetical_batch(&state, 0, &demands);
        assert!(!result.is_safe);

        let feasible: BTreeMap<ResourceId, u64> = [(1, 2), (2, 3)].into_iter().collect();
        assert!(SafetyChecker::check_hypothetical_batch(&state, 0, &feasible).is_safe);
    }

    #[test]
    fn test_probabilistic_check_uses_estimates() {
        let state = input(
            &[(1, 10)],
            &[(1, 2)],
            &[(0, &[(1, 4)]), (1, &[(1, 4)])],
            &[(0, &[(1, 10)]), (1, &[(1, 10)])],
        );

        // Statically unsafe: both agents may still claim 6 with 2 left
        assert!(!SafetyChecker::check_safety(&state).is_safe);

        // Observed demand says both agents actually peak near 5
        let mut estimator = DemandEstimator::new(&AdaptiveConfig {
            min_samples: 3,
            ..AdaptiveConfig::default()
        });
        for agent in [0, 1] {
            for quantity in [4, 5, 5, 4, 5] {
                estimator.record_request(agent, 1, quantity);
            }
        }
        let modes: BTreeMap<AgentId, DemandMode> = [
            (0, DemandMode::Adaptive),
            (1, DemandMode::Adaptive),
        ]
        .into_iter()
        .collect();

        let result =
            SafetyChecker::check_safety_probabilistic(&state, 0.95, &estimator, &modes);
        assert!(result.is_safe);
        assert_eq!(result.max_safe_confidence, 0.95);
        assert_eq!(result.estimated_max_needs[&0][&1], 5);
    }

    #[test]
    fn test_probabilistic_max_safe_confidence_search() {
        // One unit left; agent 0's samples span 4..=9, held 4. Estimated
        // remaining need is 0 at low confidence and up to 5 at high.
        let state = input(
            &[(1, 10)],
            &[(1, 1)],
            &[(0, &[(1, 4)]), (1, &[(1, 5)])],
            &[(0, &[(1, 9)]), (1, &[(1, 5)])],
        );
        let mut estimator = DemandEstimator::new(&AdaptiveConfig {
            min_samples: 3,
            ..AdaptiveConfig::default()
        });
        for quantity in [4, 5, 6, 7, 8, 9] {
            estimator.record_request(0, 1, quantity);
        }
        let modes: BTreeMap<AgentId, DemandMode> =
            [(0, DemandMode::Adaptive)].into_iter().collect();

        let result =
            SafetyChecker::check_safety_probabilistic(&state, 0.99, &estimator, &modes);
        assert!(!result.is_safe);
        // Safe at some lower confidence where the estimate drops to <= 5
        assert!(result.max_safe_confidence > 0.0);
        assert!(result.max_safe_confidence < 0.99);
    }
}
