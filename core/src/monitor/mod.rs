//! Monitor bus
//!
//! Typed event delivery to observers. The manager owns a single monitor
//! slot; `CompositeMonitor` fans out to many. Events are emitted in the
//! same order as the state mutations that caused them, and dispatch
//! happens after the manager lock is dropped so a monitor may call back
//! into the manager without deadlocking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::snapshot::SystemSnapshot;
use crate::models::{AgentId, RequestId, ResourceId};

pub mod console;
pub mod metrics;

pub use console::{ConsoleMonitor, Verbosity};
pub use metrics::{Metrics, MetricsMonitor};

/// Closed set of event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    AgentRegistered,
    AgentDeregistered,
    ResourceRegistered,
    ResourceCapacityChanged,
    RequestSubmitted,
    RequestGranted,
    RequestDenied,
    RequestTimedOut,
    RequestCancelled,
    ResourcesReleased,
    SafetyCheckPerformed,
    UnsafeStateDetected,
    QueueSizeChanged,
    AgentProgressReported,
    AgentStalled,
    AgentStallResolved,
    AgentResourcesAutoReleased,
    DelegationReported,
    DelegationCompleted,
    DelegationCancelled,
    DelegationCycleDetected,
    DemandEstimateUpdated,
    ProbabilisticSafetyCheck,
    AdaptiveDemandModeChanged,
}

/// One monitor event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub agent_id: Option<AgentId>,
    pub resource_id: Option<ResourceId>,
    pub request_id: Option<RequestId>,

    /// Numeric payload; meaning depends on the event type
    /// (units for grant/release events, queue depth for
    /// `QueueSizeChanged`, confidence for probabilistic checks, ...)
    pub value: Option<f64>,

    pub description: String,
}

impl MonitorEvent {
    pub fn new(event_type: EventType, description: impl Into<String>) -> Self {
        Self {
            event_type,
            timestamp: Utc::now(),
            agent_id: None,
            resource_id: None,
            request_id: None,
            value: None,
            description: description.into(),
        }
    }

    pub fn with_agent(mut self, agent: AgentId) -> Self {
        self.agent_id = Some(agent);
        self
    }

    pub fn with_resource(mut self, resource: ResourceId) -> Self {
        self.resource_id = Some(resource);
        self
    }

    pub fn with_request(mut self, request: RequestId) -> Self {
        self.request_id = Some(request);
        self
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }
}

/// Observer of manager events and periodic snapshots
///
/// Callbacks run on whichever thread caused the event (public operations
/// on the caller's thread, processor work on the worker thread), always
/// outside the manager lock. Implementations needing mutability use
/// interior mutability, as `MetricsMonitor` does.
pub trait Monitor: Send + Sync {
    fn on_event(&self, event: &MonitorEvent);

    fn on_snapshot(&self, _snapshot: &SystemSnapshot) {}
}

/// Fans events and snapshots out to any number of monitors
///
/// # Example
/// ```
/// use agent_warden_core_rs::monitor::{CompositeMonitor, MetricsMonitor};
///
/// let mut composite = CompositeMonitor::new();
/// composite.add_monitor(Box::new(MetricsMonitor::new()));
/// composite.add_monitor(Box::new(MetricsMonitor::new()));
/// ```
#[derive(Default)]
pub struct CompositeMonitor {
    monitors: Vec<Box<dyn Monitor>>,
}

impl CompositeMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_monitor(&mut self, monitor: Box<dyn Monitor>) {
        self.monitors.push(monitor);
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }
}

impl Monitor for CompositeMonitor {
    fn on_event(&self, event: &MonitorEvent) {
        for monitor in &self.monitors {
            monitor.on_event(event);
        }
    }

    fn on_snapshot(&self, snapshot: &SystemSnapshot) {
        for monitor in &self.monitors {
            monitor.on_snapshot(snapshot);
        }
    }
}
