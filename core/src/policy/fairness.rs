//! Fairness policy
//!
//! Weighted round-robin across agents. An agent's weight is the inverse
//! of its cumulative granted units (with +1 smoothing against division by
//! zero), so agents that have received the least go first. Within one
//! agent's turn, requests stay in submission order.

use std::collections::BTreeMap;

use super::{PendingView, SchedulingPolicy};
use crate::models::{AgentId, RequestId};

/// Fairness policy: round-robin turns, least-granted agents first
#[derive(Debug, Default)]
pub struct FairnessPolicy;

impl FairnessPolicy {
    pub fn new() -> Self {
        Self
    }
}

impl SchedulingPolicy for FairnessPolicy {
    fn name(&self) -> &str {
        "fairness"
    }

    fn order(&mut self, pending: &[PendingView]) -> Vec<RequestId> {
        // Group each agent's requests in submission order
        let mut per_agent: BTreeMap<AgentId, Vec<&PendingView>> = BTreeMap::new();
        for view in pending {
            per_agent.entry(view.agent_id).or_default().push(view);
        }
        for queue in per_agent.values_mut() {
            queue.sort_by_key(|view| view.submitted_seq);
        }

        // Turn order: weight = 1 / (1 + cumulative_granted), i.e. fewer
        // granted units first; agent id breaks exact ties.
        let mut turns: Vec<(u64, AgentId)> = per_agent
            .iter()
            .map(|(&agent, queue)| (queue[0].cumulative_granted, agent))
            .collect();
        turns.sort_unstable();

        // Round-robin: one request per agent per round
        let mut queues: Vec<std::vec::IntoIter<&PendingView>> = turns
            .iter()
            .map(|&(_, agent)| per_agent.remove(&agent).unwrap().into_iter())
            .collect();
        let mut order = Vec::with_capacity(pending.len());
        loop {
            let mut progressed = false;
            for queue in &mut queues {
                if let Some(view) = queue.next() {
                    order.push(view.request_id);
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }
        order
    }
}
