//! Shortest-need policy
//!
//! Attempts requests from agents with the smallest remaining need first.
//! Small residual claims retire fastest, which frees capacity for the
//! larger ones (the same intuition as shortest-job-first).

use super::{PendingView, SchedulingPolicy};
use crate::models::RequestId;

/// Shortest-need policy: ascending remaining need, FIFO on ties
#[derive(Debug, Default)]
pub struct ShortestNeedPolicy;

impl ShortestNeedPolicy {
    pub fn new() -> Self {
        Self
    }
}

impl SchedulingPolicy for ShortestNeedPolicy {
    fn name(&self) -> &str {
        "shortest_need"
    }

    fn order(&mut self, pending: &[PendingView]) -> Vec<RequestId> {
        let mut order: Vec<&PendingView> = pending.iter().collect();
        order.sort_by_key(|view| (view.remaining_need, view.submitted_seq));
        order.into_iter().map(|view| view.request_id).collect()
    }
}
