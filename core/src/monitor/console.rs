//! Console monitor
//!
//! Logging front-end over the `tracing` ecosystem. Verbosity controls
//! which event classes are emitted and at what level; wire a
//! `tracing_subscriber` to direct the output.

use super::{EventType, Monitor, MonitorEvent};
use crate::models::snapshot::SystemSnapshot;

/// How chatty the console monitor is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Nothing
    Quiet,

    /// Outcomes and anomalies: grants, denials, timeouts, stalls,
    /// unsafe states
    Normal,

    /// Adds submissions, releases, registrations, delegations
    Verbose,

    /// Everything, including periodic snapshots
    Debug,
}

/// Tracing-backed event logger
pub struct ConsoleMonitor {
    verbosity: Verbosity,
}

impl ConsoleMonitor {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    fn minimum_verbosity(event_type: EventType) -> Verbosity {
        match event_type {
            EventType::RequestGranted
            | EventType::RequestDenied
            | EventType::RequestTimedOut
            | EventType::RequestCancelled
            | EventType::UnsafeStateDetected
            | EventType::AgentStalled
            | EventType::AgentStallResolved
            | EventType::AgentResourcesAutoReleased
            | EventType::DelegationCycleDetected => Verbosity::Normal,

            EventType::AgentRegistered
            | EventType::AgentDeregistered
            | EventType::ResourceRegistered
            | EventType::ResourceCapacityChanged
            | EventType::RequestSubmitted
            | EventType::ResourcesReleased
            | EventType::DelegationReported
            | EventType::DelegationCompleted
            | EventType::DelegationCancelled
            | EventType::AdaptiveDemandModeChanged => Verbosity::Verbose,

            EventType::SafetyCheckPerformed
            | EventType::QueueSizeChanged
            | EventType::AgentProgressReported
            | EventType::DemandEstimateUpdated
            | EventType::ProbabilisticSafetyCheck => Verbosity::Debug,
        }
    }
}

impl Monitor for ConsoleMonitor {
    fn on_event(&self, event: &MonitorEvent) {
        if self.verbosity < Self::minimum_verbosity(event.event_type) {
            return;
        }
        match event.event_type {
            EventType::UnsafeStateDetected
            | EventType::AgentStalled
            | EventType::DelegationCycleDetected => {
                tracing::warn!(
                    event = ?event.event_type,
                    agent = ?event.agent_id,
                    resource = ?event.resource_id,
                    request = ?event.request_id,
                    value = ?event.value,
                    "{}",
                    event.description
                );
            }
            _ => {
                tracing::info!(
                    event = ?event.event_type,
                    agent = ?event.agent_id,
                    resource = ?event.resource_id,
                    request = ?event.request_id,
                    value = ?event.value,
                    "{}",
                    event.description
                );
            }
        }
    }

    fn on_snapshot(&self, snapshot: &SystemSnapshot) {
        if self.verbosity < Verbosity::Debug {
            return;
        }
        tracing::debug!(
            is_safe = snapshot.is_safe,
            agents = snapshot.agents.len(),
            pending = snapshot.queue_depth(),
            "periodic snapshot"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_ordering() {
        assert!(Verbosity::Quiet < Verbosity::Normal);
        assert!(Verbosity::Normal < Verbosity::Verbose);
        assert!(Verbosity::Verbose < Verbosity::Debug);
    }

    #[test]
    fn test_event_classes() {
        assert_eq!(
            ConsoleMonitor::minimum_verbosity(EventType::RequestGranted),
            Verbosity::Normal
        );
        assert_eq!(
            ConsoleMonitor::minimum_verbosity(EventType::RequestSubmitted),
            Verbosity::Verbose
        );
        assert_eq!(
            ConsoleMonitor::minimum_verbosity(EventType::QueueSizeChanged),
            Verbosity::Debug
        );
    }
}
