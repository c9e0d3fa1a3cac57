//! Immutable point-in-time views of the manager state
//!
//! Snapshots are assembled under the manager lock and handed to monitors
//! after the lock is dropped, so observers can inspect them (or call back
//! into the manager) without blocking request processing.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::agent::AgentState;
use crate::models::request::ResourceRequest;
use crate::models::{AgentId, ResourceId};

/// One agent's allocation state at snapshot time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentAllocationSnapshot {
    pub agent_id: AgentId,
    pub name: String,
    pub state: AgentState,
    pub priority: u32,

    /// Units held per resource
    pub allocations: BTreeMap<ResourceId, u64>,

    /// Declared maximum need per resource
    pub max_needs: BTreeMap<ResourceId, u64>,
}

/// Point-in-time view of the entire manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub timestamp: DateTime<Utc>,

    /// Total capacity per resource
    pub total_resources: BTreeMap<ResourceId, u64>,

    /// Available units per resource
    pub available_resources: BTreeMap<ResourceId, u64>,

    /// Per-agent allocation and declared max
    pub agents: Vec<AgentAllocationSnapshot>,

    /// Requests still in the pending queue, in submission order
    pub pending_requests: Vec<ResourceRequest>,

    /// Banker's verdict at snapshot time
    pub is_safe: bool,
}

impl SystemSnapshot {
    /// Utilization per resource: `1 - available / total`
    ///
    /// Zero-capacity resources report zero utilization.
    pub fn utilization(&self) -> BTreeMap<ResourceId, f64> {
        self.total_resources
            .iter()
            .map(|(&id, &total)| {
                let available = self.available_resources.get(&id).copied().unwrap_or(0);
                let used = if total == 0 {
                    0.0
                } else {
                    1.0 - (available as f64 / total as f64)
                };
                (id, used)
            })
            .collect()
    }

    /// Pending queue depth
    pub fn queue_depth(&self) -> usize {
        self.pending_requests.len()
    }
}
