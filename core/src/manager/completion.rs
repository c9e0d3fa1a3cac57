//! Per-request completion primitive
//!
//! Every request gets one `CompletionSlot`: a single-shot, one-producer
//! cell the processor fires exactly once with the terminal status.
//! Synchronous blockers, futures, and callback requests all wait on the
//! same slot.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::models::request::RequestStatus;
use crate::models::RequestId;

/// Single-shot completion cell
pub(crate) struct CompletionSlot {
    status: Mutex<Option<RequestStatus>>,
    cond: Condvar,
}

impl CompletionSlot {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(None),
            cond: Condvar::new(),
        })
    }

    /// Fire the slot; the first status wins, later fires are no-ops.
    ///
    /// Returns whether this call was the one that fired.
    pub(crate) fn fire(&self, status: RequestStatus) -> bool {
        let mut slot = self.status.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(status);
        self.cond.notify_all();
        true
    }

    /// Non-blocking peek
    pub(crate) fn peek(&self) -> Option<RequestStatus> {
        *self.status.lock()
    }

    /// Block until the slot fires
    pub(crate) fn wait(&self) -> RequestStatus {
        let mut slot = self.status.lock();
        while slot.is_none() {
            self.cond.wait(&mut slot);
        }
        slot.unwrap()
    }

    /// Block until the slot fires or `deadline` passes
    pub(crate) fn wait_until(&self, deadline: Instant) -> Option<RequestStatus> {
        let mut slot = self.status.lock();
        while slot.is_none() {
            if self.cond.wait_until(&mut slot, deadline).timed_out() {
                return *slot;
            }
        }
        *slot
    }
}

/// Completion handle returned by `request_resources_async`
///
/// # Example
/// ```rust,ignore
/// let future = manager.request_resources_async(agent, resource, 3, None)?;
/// if !future.ready() {
///     // do other work
/// }
/// let status = future.result();
/// ```
pub struct FutureRequestStatus {
    request_id: RequestId,
    slot: Arc<CompletionSlot>,
}

impl FutureRequestStatus {
    pub(crate) fn new(request_id: RequestId, slot: Arc<CompletionSlot>) -> Self {
        Self { request_id, slot }
    }

    /// The id of the underlying request
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Whether the terminal status is already available
    pub fn ready(&self) -> bool {
        self.slot.peek().is_some()
    }

    /// Block until the request reaches a terminal status
    pub fn result(&self) -> RequestStatus {
        self.slot.wait()
    }

    /// Non-blocking status peek
    pub fn try_result(&self) -> Option<RequestStatus> {
        self.slot.peek()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_first_fire_wins() {
        let slot = CompletionSlot::new();
        assert!(slot.fire(RequestStatus::Granted));
        assert!(!slot.fire(RequestStatus::Cancelled));
        assert_eq!(slot.peek(), Some(RequestStatus::Granted));
    }

    #[test]
    fn test_wait_blocks_until_fired() {
        let slot = CompletionSlot::new();
        let waiter = slot.clone();
        let handle = thread::spawn(move || waiter.wait());

        thread::sleep(Duration::from_millis(20));
        slot.fire(RequestStatus::Granted);
        assert_eq!(handle.join().unwrap(), RequestStatus::Granted);
    }

    #[test]
    fn test_wait_until_times_out() {
        let slot = CompletionSlot::new();
        let deadline = Instant::now() + Duration::from_millis(10);
        assert_eq!(slot.wait_until(deadline), None);
    }

    #[test]
    fn test_future_wrapper() {
        let slot = CompletionSlot::new();
        let future = FutureRequestStatus::new(7, slot.clone());
        assert_eq!(future.request_id(), 7);
        assert!(!future.ready());

        slot.fire(RequestStatus::TimedOut);
        assert!(future.ready());
        assert_eq!(future.result(), RequestStatus::TimedOut);
        assert_eq!(future.try_result(), Some(RequestStatus::TimedOut));
    }
}
