//! Resource request lifecycle
//!
//! A request asks for units of one resource, or for several resources
//! atomically (batch). Status transitions only
//! `Pending -> {Granted, Denied, TimedOut, Cancelled}`; terminal statuses
//! are sinks.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AgentId, RequestId, ResourceId};

/// Outcome-or-progress of a resource request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Waiting in the pending queue
    Pending,

    /// Units were allocated
    Granted,

    /// Permanently infeasible at submission time
    Denied,

    /// Deadline passed before the request could be granted
    TimedOut,

    /// Cancelled by the caller or by agent deregistration
    Cancelled,
}

impl RequestStatus {
    /// Terminal statuses are sinks; only `Pending` can transition.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

/// A submitted resource request
///
/// Single-resource requests carry a singleton demand map; batch requests
/// carry one entry per resource and are granted all-or-nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRequest {
    /// Monotonic request id
    id: RequestId,

    /// Requesting agent
    agent_id: AgentId,

    /// Requested units per resource
    demands: BTreeMap<ResourceId, u64>,

    /// Submission wall-clock timestamp
    submitted_at: DateTime<Utc>,

    /// Absolute wall-clock deadline, if any
    deadline: Option<DateTime<Utc>>,

    /// Effective scheduling priority (agent priority unless overridden)
    priority: u32,

    /// Current status
    status: RequestStatus,
}

impl ResourceRequest {
    pub(crate) fn new(
        id: RequestId,
        agent_id: AgentId,
        demands: BTreeMap<ResourceId, u64>,
        submitted_at: DateTime<Utc>,
        deadline: Option<DateTime<Utc>>,
        priority: u32,
    ) -> Self {
        Self {
            id,
            agent_id,
            demands,
            submitted_at,
            deadline,
            priority,
            status: RequestStatus::Pending,
        }
    }

    /// Get request ID
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Get requesting agent ID
    pub fn agent_id(&self) -> AgentId {
        self.agent_id
    }

    /// Requested units per resource
    pub fn demands(&self) -> &BTreeMap<ResourceId, u64> {
        &self.demands
    }

    /// Requested units of one resource (0 if not part of this request)
    pub fn quantity_for(&self, resource: ResourceId) -> u64 {
        self.demands.get(&resource).copied().unwrap_or(0)
    }

    /// Total units requested across all resources
    pub fn total_quantity(&self) -> u64 {
        self.demands.values().sum()
    }

    /// True for atomic multi-resource requests
    pub fn is_batch(&self) -> bool {
        self.demands.len() > 1
    }

    /// Submission timestamp
    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    /// Absolute deadline, if any
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// Effective scheduling priority
    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// Current status
    pub fn status(&self) -> RequestStatus {
        self.status
    }

    /// Move to a terminal status
    ///
    /// Terminal statuses are sinks; a second transition is ignored.
    pub(crate) fn finish(&mut self, status: RequestStatus) {
        debug_assert!(status.is_terminal(), "finish requires a terminal status");
        if self.status == RequestStatus::Pending {
            self.status = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(demands: &[(ResourceId, u64)]) -> ResourceRequest {
        ResourceRequest::new(
            1,
            0,
            demands.iter().copied().collect(),
            Utc::now(),
            None,
            50,
        )
    }

    #[test]
    fn test_terminal_statuses_are_sinks() {
        let mut req = request(&[(1, 3)]);
        assert_eq!(req.status(), RequestStatus::Pending);

        req.finish(RequestStatus::Granted);
        assert_eq!(req.status(), RequestStatus::Granted);

        // A second transition is ignored
        req.finish(RequestStatus::Cancelled);
        assert_eq!(req.status(), RequestStatus::Granted);
    }

    #[test]
    fn test_batch_detection() {
        assert!(!request(&[(1, 3)]).is_batch());
        assert!(request(&[(1, 3), (2, 5)]).is_batch());
        assert_eq!(request(&[(1, 3), (2, 5)]).total_quantity(), 8);
    }
}
