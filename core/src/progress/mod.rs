//! Progress tracking and stall detection
//!
//! Each tracked agent carries a last-progress timestamp. The manager's
//! background processor sweeps the table on a configured cadence and
//! flags agents whose silence exceeds their stall threshold; optionally
//! their held resources are force-released.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::models::AgentId;

/// Per-agent progress record
#[derive(Debug, Clone)]
pub struct ProgressRecord {
    pub last_progress_at: Instant,
    pub last_metric: String,
    pub last_value: f64,
    pub stall_threshold: Duration,

    /// Set by the sweep, cleared by the next progress report
    pub stalled: bool,
}

/// Stall detector over per-agent progress records
pub struct ProgressTracker {
    records: BTreeMap<AgentId, ProgressRecord>,
    default_threshold: Duration,
}

impl ProgressTracker {
    pub fn new(default_threshold: Duration) -> Self {
        Self {
            records: BTreeMap::new(),
            default_threshold,
        }
    }

    /// Start tracking an agent (called at registration)
    pub fn track_agent(&mut self, agent: AgentId) {
        self.records.entry(agent).or_insert_with(|| ProgressRecord {
            last_progress_at: Instant::now(),
            last_metric: String::new(),
            last_value: 0.0,
            stall_threshold: self.default_threshold,
            stalled: false,
        });
    }

    /// Stop tracking an agent (called at deregistration)
    pub fn remove_agent(&mut self, agent: AgentId) {
        self.records.remove(&agent);
    }

    /// Record a progress report
    ///
    /// Returns `true` when the report resolves a standing stall flag.
    pub fn report(&mut self, agent: AgentId, metric: &str, value: f64) -> bool {
        self.track_agent(agent);
        let record = self.records.get_mut(&agent).unwrap();
        record.last_progress_at = Instant::now();
        record.last_metric = metric.to_string();
        record.last_value = value;
        std::mem::take(&mut record.stalled)
    }

    /// Override one agent's stall threshold
    pub fn set_threshold(&mut self, agent: AgentId, threshold: Duration) {
        self.track_agent(agent);
        self.records.get_mut(&agent).unwrap().stall_threshold = threshold;
    }

    /// Whether the agent is currently flagged as stalled
    pub fn is_stalled(&self, agent: AgentId) -> bool {
        self.records
            .get(&agent)
            .map(|record| {
                record.stalled || record.last_progress_at.elapsed() >= record.stall_threshold
            })
            .unwrap_or(false)
    }

    /// Look up one agent's record
    pub fn record(&self, agent: AgentId) -> Option<&ProgressRecord> {
        self.records.get(&agent)
    }

    /// Flag agents whose silence has crossed their threshold
    ///
    /// Returns the agents newly flagged by this sweep (already-flagged
    /// agents are not repeated).
    pub fn sweep(&mut self, now: Instant) -> Vec<AgentId> {
        let mut newly_stalled = Vec::new();
        for (&agent, record) in &mut self.records {
            if record.stalled {
                continue;
            }
            if now.duration_since(record.last_progress_at) >= record.stall_threshold {
                record.stalled = true;
                newly_stalled.push(agent);
            }
        }
        newly_stalled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_agent_is_not_stalled() {
        let mut tracker = ProgressTracker::new(Duration::from_secs(30));
        tracker.track_agent(0);
        assert!(!tracker.is_stalled(0));
        assert!(tracker.sweep(Instant::now()).is_empty());
    }

    #[test]
    fn test_sweep_flags_once() {
        let mut tracker = ProgressTracker::new(Duration::from_millis(0));
        tracker.track_agent(0);

        let later = Instant::now() + Duration::from_millis(1);
        assert_eq!(tracker.sweep(later), vec![0]);
        // Second sweep does not re-flag
        assert!(tracker.sweep(later).is_empty());
        assert!(tracker.is_stalled(0));
    }

    #[test]
    fn test_report_resolves_stall() {
        let mut tracker = ProgressTracker::new(Duration::from_millis(0));
        tracker.track_agent(0);
        tracker.sweep(Instant::now() + Duration::from_millis(1));
        assert!(tracker.is_stalled(0));

        // The next report clears the flag and says so
        assert!(tracker.report(0, "steps", 3.0));
        assert!(!tracker.report(0, "steps", 4.0));

        let record = tracker.record(0).unwrap();
        assert_eq!(record.last_metric, "steps");
        assert_eq!(record.last_value, 4.0);
    }

    #[test]
    fn test_per_agent_threshold_override() {
        let mut tracker = ProgressTracker::new(Duration::from_secs(3600));
        tracker.track_agent(0);
        tracker.track_agent(1);
        tracker.set_threshold(1, Duration::from_millis(0));

        let flagged = tracker.sweep(Instant::now() + Duration::from_millis(1));
        assert_eq!(flagged, vec![1]);
    }

    #[test]
    fn test_untracked_agent_is_not_stalled() {
        let tracker = ProgressTracker::new(Duration::from_millis(0));
        assert!(!tracker.is_stalled(99));
    }
}
