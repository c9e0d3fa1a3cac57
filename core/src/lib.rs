//! Agent Warden Core - Rust Engine
//!
//! Deadlock prevention for multi-agent systems: a centralized broker that
//! admits resource requests only when the resulting global allocation
//! provably admits a completion schedule.
//!
//! # Architecture
//!
//! - **safety**: Banker's-style feasibility oracle
//! - **models**: domain types (Resource, Agent, ResourceRequest, snapshots)
//! - **manager**: request/release state machine and background processor
//! - **policy**: pluggable orderings over the pending queue
//! - **delegation**: agent-to-agent delegation graph with cycle detection
//! - **demand**: statistical estimation of per-agent maximum need
//! - **progress**: stall detection with optional forced release
//! - **monitor**: typed event delivery to observers
//!
//! # Critical Invariants
//!
//! 1. For every resource: `available + sum(held) == capacity`
//! 2. For every (agent, resource): `0 <= held <= declared max <= capacity`
//! 3. A grant happens only if the resulting state passes the safety check

// Module declarations
pub mod config;
pub mod delegation;
pub mod demand;
pub mod error;
pub mod manager;
pub mod models;
pub mod monitor;
pub mod policy;
pub mod progress;
pub mod safety;

// Re-exports for convenience
pub use config::{AdaptiveConfig, Config, CycleAction, DelegationConfig, ProgressConfig};
pub use delegation::{DelegationGraph, DelegationInfo, DelegationResult};
pub use demand::{DemandEstimator, UsageStats};
pub use error::{WardenError, WardenResult};
pub use manager::{FutureRequestStatus, ResourceManager};
pub use models::{
    agent::{
        Agent, AgentState, DemandMode, PRIORITY_CRITICAL, PRIORITY_HIGH, PRIORITY_LOW,
        PRIORITY_NORMAL,
    },
    request::{RequestStatus, ResourceRequest},
    resource::{Resource, ResourceCategory},
    snapshot::{AgentAllocationSnapshot, SystemSnapshot},
    AgentId, RequestId, ResourceId,
};
pub use monitor::{
    CompositeMonitor, ConsoleMonitor, EventType, Metrics, MetricsMonitor, Monitor, MonitorEvent,
    Verbosity,
};
pub use policy::{
    DeadlinePolicy, FairnessPolicy, FifoPolicy, PendingView, PolicyConfig, PriorityPolicy,
    SchedulingPolicy, ShortestNeedPolicy,
};
pub use progress::{ProgressRecord, ProgressTracker};
pub use safety::{
    ProbabilisticSafetyResult, SafetyCheckInput, SafetyCheckResult, SafetyChecker,
};
