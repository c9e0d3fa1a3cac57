//! FIFO (First-In-First-Out) policy
//!
//! Simplest baseline: attempt requests in strict submission order. No
//! consideration of priority, need, or deadlines.

use super::{PendingView, SchedulingPolicy};
use crate::models::RequestId;

/// FIFO policy: strict submission order
#[derive(Debug, Default)]
pub struct FifoPolicy;

impl FifoPolicy {
    pub fn new() -> Self {
        Self
    }
}

impl SchedulingPolicy for FifoPolicy {
    fn name(&self) -> &str {
        "fifo"
    }

    fn order(&mut self, pending: &[PendingView]) -> Vec<RequestId> {
        let mut order: Vec<&PendingView> = pending.iter().collect();
        order.sort_by_key(|view| view.submitted_seq);
        order.into_iter().map(|view| view.request_id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::test_support::view;

    #[test]
    fn test_fifo_orders_by_submission() {
        let mut policy = FifoPolicy::new();
        let pending = vec![view(10, 0, 3), view(11, 1, 1), view(12, 2, 2)];
        assert_eq!(policy.order(&pending), vec![11, 12, 10]);
    }

    #[test]
    fn test_fifo_empty_queue() {
        let mut policy = FifoPolicy::new();
        assert!(policy.order(&[]).is_empty());
    }
}
