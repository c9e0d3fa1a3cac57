//! Deadline policy
//!
//! Attempts requests with the earliest absolute deadline first; requests
//! without a deadline sort last. Ties fall back to submission order.

use super::{PendingView, SchedulingPolicy};
use crate::models::RequestId;

/// Deadline policy: earliest deadline first, no-deadline last
#[derive(Debug, Default)]
pub struct DeadlinePolicy;

impl DeadlinePolicy {
    pub fn new() -> Self {
        Self
    }
}

impl SchedulingPolicy for DeadlinePolicy {
    fn name(&self) -> &str {
        "deadline"
    }

    fn order(&mut self, pending: &[PendingView]) -> Vec<RequestId> {
        let mut order: Vec<&PendingView> = pending.iter().collect();
        // None sorts after Some(_) via the is_none discriminant
        order.sort_by_key(|view| (view.deadline.is_none(), view.deadline, view.submitted_seq));
        order.into_iter().map(|view| view.request_id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::test_support::view;
    use std::time::{Duration, Instant};

    #[test]
    fn test_earliest_deadline_first() {
        let mut policy = DeadlinePolicy::new();
        let now = Instant::now();

        let mut late = view(10, 0, 1);
        late.deadline = Some(now + Duration::from_secs(60));
        let mut soon = view(11, 1, 2);
        soon.deadline = Some(now + Duration::from_secs(5));
        let unbounded = view(12, 2, 0); // submitted first, but no deadline

        assert_eq!(policy.order(&[late, soon, unbounded]), vec![11, 10, 12]);
    }

    #[test]
    fn test_no_deadline_ties_fall_back_to_fifo() {
        let mut policy = DeadlinePolicy::new();
        let pending = vec![view(10, 0, 2), view(11, 1, 1)];
        assert_eq!(policy.order(&pending), vec![11, 10]);
    }
}
