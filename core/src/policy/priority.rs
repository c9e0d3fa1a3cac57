//! Priority policy
//!
//! Attempts requests in descending effective priority; ties fall back to
//! submission order so equal-priority agents keep FIFO fairness.

use super::{PendingView, SchedulingPolicy};
use crate::models::RequestId;

/// Priority policy: highest priority first, FIFO within a level
#[derive(Debug, Default)]
pub struct PriorityPolicy;

impl PriorityPolicy {
    pub fn new() -> Self {
        Self
    }
}

impl SchedulingPolicy for PriorityPolicy {
    fn name(&self) -> &str {
        "priority"
    }

    fn order(&mut self, pending: &[PendingView]) -> Vec<RequestId> {
        let mut order: Vec<&PendingView> = pending.iter().collect();
        order.sort_by_key(|view| (std::cmp::Reverse(view.priority), view.submitted_seq));
        order.into_iter().map(|view| view.request_id).collect()
    }
}
