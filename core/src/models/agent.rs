//! Agent model
//!
//! Represents an autonomous worker (AI agent, tool, pipeline) that holds
//! resources and makes requests. Each agent has:
//! - Manager-assigned integer id (the caller-supplied id is advisory)
//! - Integer priority (higher is more urgent)
//! - Declared maximum need per resource
//! - Current allocation per resource
//!
//! CRITICAL: `0 <= allocation <= max_need <= capacity` per resource.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{AgentId, ResourceId};

/// Lowest scheduling priority.
pub const PRIORITY_LOW: u32 = 0;
/// Default scheduling priority.
pub const PRIORITY_NORMAL: u32 = 50;
/// Elevated scheduling priority.
pub const PRIORITY_HIGH: u32 = 100;
/// Highest scheduling priority.
pub const PRIORITY_CRITICAL: u32 = 200;

/// Agent lifecycle state
///
/// `Deregistered` is terminal. An agent is `Waiting` iff it has at least
/// one pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Registered,
    Active,
    Waiting,
    Releasing,
    Deregistered,
}

/// How the safety checker bounds this agent's future demand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandMode {
    /// Safety uses the declared max need only
    Static,

    /// Safety substitutes the demand estimator's quantile estimate
    Adaptive,

    /// Safety uses `max(declared, estimate)`
    Hybrid,
}

/// An autonomous worker competing for resources
///
/// Agents are caller-constructed, configured with builder-style methods,
/// and handed to `ResourceManager::register_agent`, which assigns the
/// effective id.
///
/// # Example
/// ```
/// use agent_warden_core_rs::{Agent, PRIORITY_HIGH};
///
/// let agent = Agent::new(0, "summarizer".to_string())
///     .with_priority(PRIORITY_HIGH)
///     .declare_max_need(1, 5);
/// assert_eq!(agent.max_need(1), 5);
/// assert_eq!(agent.allocation(1), 0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Identifier; advisory until the manager assigns the real one
    id: AgentId,

    /// Human-readable name
    name: String,

    /// Scheduling priority (higher is more urgent)
    priority: u32,

    /// Demand estimation mode
    demand_mode: DemandMode,

    /// Declared maximum need per resource
    max_needs: BTreeMap<ResourceId, u64>,

    /// Units currently held per resource
    allocations: BTreeMap<ResourceId, u64>,

    /// Lifecycle state
    state: AgentState,
}

impl Agent {
    /// Create a new agent with default priority and static demand mode
    pub fn new(id: AgentId, name: String) -> Self {
        Self {
            id,
            name,
            priority: PRIORITY_NORMAL,
            demand_mode: DemandMode::Static,
            max_needs: BTreeMap::new(),
            allocations: BTreeMap::new(),
            state: AgentState::Registered,
        }
    }

    /// Set scheduling priority (builder style)
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Set demand estimation mode (builder style)
    pub fn with_demand_mode(mut self, mode: DemandMode) -> Self {
        self.demand_mode = mode;
        self
    }

    /// Declare the maximum number of units this agent may ever hold of a
    /// resource (builder style)
    pub fn declare_max_need(mut self, resource: ResourceId, max: u64) -> Self {
        self.max_needs.insert(resource, max);
        self
    }

    /// Get agent ID
    pub fn id(&self) -> AgentId {
        self.id
    }

    /// Get agent name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get scheduling priority
    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// Get demand estimation mode
    pub fn demand_mode(&self) -> DemandMode {
        self.demand_mode
    }

    /// Get lifecycle state
    pub fn state(&self) -> AgentState {
        self.state
    }

    /// Declared maximum need for one resource (0 if undeclared)
    pub fn max_need(&self, resource: ResourceId) -> u64 {
        self.max_needs.get(&resource).copied().unwrap_or(0)
    }

    /// All declared maximum needs
    pub fn max_needs(&self) -> &BTreeMap<ResourceId, u64> {
        &self.max_needs
    }

    /// Units currently held of one resource
    pub fn allocation(&self, resource: ResourceId) -> u64 {
        self.allocations.get(&resource).copied().unwrap_or(0)
    }

    /// All current allocations
    pub fn allocations(&self) -> &BTreeMap<ResourceId, u64> {
        &self.allocations
    }

    /// Remaining need for one resource: `max_need - allocation`
    ///
    /// Saturates at zero if the allocation somehow exceeds the declared
    /// max (the safety checker reports that condition unsafe).
    pub fn remaining_need(&self, resource: ResourceId) -> u64 {
        self.max_need(resource).saturating_sub(self.allocation(resource))
    }

    /// True if this agent holds no units of any resource
    pub fn holds_nothing(&self) -> bool {
        self.allocations.values().all(|&units| units == 0)
    }

    pub(crate) fn set_id(&mut self, id: AgentId) {
        self.id = id;
    }

    pub(crate) fn set_state(&mut self, state: AgentState) {
        self.state = state;
    }

    pub(crate) fn set_demand_mode(&mut self, mode: DemandMode) {
        self.demand_mode = mode;
    }

    pub(crate) fn set_max_need(&mut self, resource: ResourceId, max: u64) {
        self.max_needs.insert(resource, max);
    }

    /// Record a grant of `quantity` units
    pub(crate) fn grant(&mut self, resource: ResourceId, quantity: u64) {
        *self.allocations.entry(resource).or_insert(0) += quantity;
    }

    /// Release up to `quantity` units, clamped to the held amount
    ///
    /// Returns the number of units actually released.
    pub(crate) fn release(&mut self, resource: ResourceId, quantity: u64) -> u64 {
        let held = self.allocations.entry(resource).or_insert(0);
        let released = quantity.min(*held);
        *held -= released;
        if *held == 0 {
            self.allocations.remove(&resource);
        }
        released
    }
}
