//! Resource manager engine
//!
//! The manager owns all state: resources, agents, the allocation table,
//! the pending queue, the delegation graph, progress records, and the
//! demand estimator. Public operations may be called from any thread; a
//! single coarse mutex guards the state and a background processor
//! retries pending requests.
//!
//! # Admission protocol
//!
//! ```text
//! For each request:
//! 1. Validate agent, resource, quantity, claim, capacity, queue room
//! 2. If available and the hypothetical grant is safe: grant now
//! 3. If no reachable state could satisfy it: deny
//! 4. Otherwise: enqueue; the processor retries on every release,
//!    submission, policy change, and poll tick
//! ```
//!
//! # Locking
//!
//! Two locks, never held together across a monitor call: the state lock
//! and the monitor lock. Events are collected under the state lock and
//! dispatched after it is dropped, so a monitor can query the manager
//! from inside a callback without deadlocking.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::{Condvar, Mutex};

use crate::config::{Config, CycleAction};
use crate::delegation::{DelegationGraph, DelegationResult};
use crate::demand::{DemandEstimator, UsageStats};
use crate::error::{WardenError, WardenResult};
use crate::manager::completion::{CompletionSlot, FutureRequestStatus};
use crate::models::agent::{Agent, AgentState, DemandMode};
use crate::models::request::{RequestStatus, ResourceRequest};
use crate::models::resource::Resource;
use crate::models::snapshot::{AgentAllocationSnapshot, SystemSnapshot};
use crate::models::{AgentId, RequestId, ResourceId};
use crate::monitor::{EventType, Monitor, MonitorEvent};
use crate::policy::{PendingView, PolicyConfig, SchedulingPolicy};
use crate::progress::ProgressTracker;
use crate::safety::{SafetyCheckInput, SafetyChecker};

type RequestCallback = Box<dyn FnOnce(RequestId, RequestStatus) + Send>;

/// A request sitting in the pending queue
struct PendingRequest {
    record: ResourceRequest,
    deadline: Option<Instant>,
    submitted_seq: u64,
    adaptive: bool,
    slot: Arc<CompletionSlot>,
    callback: Option<RequestCallback>,
}

/// A terminal outcome ready to be signalled outside the state lock
struct Completion {
    request_id: RequestId,
    status: RequestStatus,
    slot: Arc<CompletionSlot>,
    callback: Option<RequestCallback>,
}

/// Everything one operation produced while holding the state lock
#[derive(Default)]
struct OpOutput {
    events: Vec<MonitorEvent>,
    completions: Vec<Completion>,
    snapshot: Option<SystemSnapshot>,
}

struct ManagerState {
    config: Config,
    resources: BTreeMap<ResourceId, Resource>,
    agents: BTreeMap<AgentId, Agent>,
    agent_names: BTreeMap<String, AgentId>,
    pending: Vec<PendingRequest>,
    delegations: DelegationGraph,
    progress: ProgressTracker,
    estimator: DemandEstimator,
    policy: Box<dyn SchedulingPolicy>,

    /// Units granted per agent over its lifetime (fairness weights)
    cumulative_grants: BTreeMap<AgentId, u64>,

    /// Callback completions routed to the worker thread
    deferred: Vec<Completion>,

    next_agent_id: AgentId,
    next_request_id: RequestId,
    next_submit_seq: u64,
    last_snapshot_at: Instant,
    last_progress_sweep: Instant,
    running: bool,
    has_worker: bool,
}

struct Shared {
    state: Mutex<ManagerState>,
    wake: Condvar,

    /// Held only long enough to clone; dispatch happens lock-free so a
    /// monitor may call back into the manager
    monitor: Mutex<Option<Arc<dyn Monitor>>>,
}

/// Safety-enforcing resource broker for multi-agent systems
///
/// # Example
/// ```rust,ignore
/// use agent_warden_core_rs::{
///     Agent, Config, RequestStatus, Resource, ResourceCategory, ResourceManager,
/// };
///
/// let manager = ResourceManager::new(Config::default());
/// manager.start();
///
/// manager.register_resource(Resource::new(
///     1, "api".to_string(), ResourceCategory::ApiRateLimit, 10,
/// ))?;
/// let agent = manager.register_agent(
///     Agent::new(0, "worker".to_string()).declare_max_need(1, 5),
/// )?;
///
/// let status = manager.request_resources(agent, 1, 3, None)?;
/// assert_eq!(status, RequestStatus::Granted);
/// manager.release_resources(agent, 1, 3)?;
/// manager.stop();
/// ```
pub struct ResourceManager {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ResourceManager {
    pub fn new(config: Config) -> Self {
        let now = Instant::now();
        let progress = ProgressTracker::new(config.progress.default_stall_threshold);
        let estimator = DemandEstimator::new(&config.adaptive);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ManagerState {
                    config,
                    resources: BTreeMap::new(),
                    agents: BTreeMap::new(),
                    agent_names: BTreeMap::new(),
                    pending: Vec::new(),
                    delegations: DelegationGraph::new(),
                    progress,
                    estimator,
                    policy: PolicyConfig::default().build(),
                    cumulative_grants: BTreeMap::new(),
                    deferred: Vec::new(),
                    next_agent_id: 0,
                    next_request_id: 0,
                    next_submit_seq: 0,
                    last_snapshot_at: now,
                    last_progress_sweep: now,
                    running: false,
                    has_worker: false,
                }),
                wake: Condvar::new(),
                monitor: Mutex::new(None),
            }),
            worker: Mutex::new(None),
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Start the manager; spawns the background processor unless
    /// `thread_safe` is off
    pub fn start(&self) {
        let mut state = self.shared.state.lock();
        if state.running {
            return;
        }
        state.running = true;
        if state.config.thread_safe {
            state.has_worker = true;
            drop(state);
            let shared = self.shared.clone();
            let handle = std::thread::Builder::new()
                .name("warden-processor".to_string())
                .spawn(move || worker_loop(shared))
                .expect("failed to spawn processor thread");
            *self.worker.lock() = Some(handle);
        }
    }

    /// Stop the manager; cancels every pending request and joins the
    /// processor. Idempotent.
    pub fn stop(&self) {
        let output = {
            let mut state = self.shared.state.lock();
            if !state.running {
                return;
            }
            state.running = false;
            state.has_worker = false;
            let mut output = OpOutput::default();
            while let Some(entry) = state.pending.pop() {
                state.finish_pending(entry, RequestStatus::Cancelled, &mut output);
            }
            output.completions.append(&mut state.deferred);
            self.shared.wake.notify_all();
            output
        };
        self.deliver(output);
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }

    /// Whether `start` has been called and `stop` has not
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    /// Install the monitor (a `CompositeMonitor` composes many)
    pub fn set_monitor(&self, monitor: Box<dyn Monitor>) {
        *self.shared.monitor.lock() = Some(Arc::from(monitor));
    }

    /// Run one processor iteration on the calling thread
    ///
    /// This is how embedders drive the engine when `thread_safe` is off;
    /// with the background processor running it simply forces an extra
    /// iteration.
    pub fn process_pending(&self) {
        let output = {
            let mut state = self.shared.state.lock();
            state.run_iteration(Instant::now())
        };
        self.deliver(output);
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Register a resource; fails if the id is already taken
    pub fn register_resource(&self, resource: Resource) -> WardenResult<()> {
        let output = {
            let mut state = self.shared.state.lock();
            if state.resources.contains_key(&resource.id()) {
                return Err(WardenError::InvalidRequest {
                    reason: format!("resource id {} is already registered", resource.id()),
                });
            }
            let mut output = OpOutput::default();
            output.events.push(
                MonitorEvent::new(
                    EventType::ResourceRegistered,
                    format!(
                        "resource '{}' registered with capacity {}",
                        resource.name(),
                        resource.total_capacity()
                    ),
                )
                .with_resource(resource.id())
                .with_value(resource.total_capacity() as f64),
            );
            state.resources.insert(resource.id(), resource);
            output
        };
        self.deliver(output);
        Ok(())
    }

    /// Change a resource's total capacity
    ///
    /// Fails if the new total would drop below the currently allocated
    /// sum.
    pub fn update_resource_capacity(
        &self,
        resource: ResourceId,
        new_total: u64,
    ) -> WardenResult<()> {
        let output = {
            let mut state = self.shared.state.lock();
            let entry = state
                .resources
                .get_mut(&resource)
                .ok_or(WardenError::ResourceNotFound(resource))?;
            entry.set_total_capacity(new_total)?;
            let mut output = OpOutput::default();
            output.events.push(
                MonitorEvent::new(
                    EventType::ResourceCapacityChanged,
                    format!("resource {resource} capacity changed to {new_total}"),
                )
                .with_resource(resource)
                .with_value(new_total as f64),
            );
            self.shared.wake.notify_all();
            output
        };
        self.deliver(output);
        Ok(())
    }

    /// Register an agent; returns the manager-assigned id
    ///
    /// The id on the passed `Agent` is advisory and is replaced.
    pub fn register_agent(&self, mut agent: Agent) -> WardenResult<AgentId> {
        let (output, assigned) = {
            let mut state = self.shared.state.lock();
            if state.agents.len() >= state.config.max_agents {
                return Err(WardenError::InvalidRequest {
                    reason: format!("agent limit {} reached", state.config.max_agents),
                });
            }
            if state.config.unique_agent_names && state.agent_names.contains_key(agent.name()) {
                return Err(WardenError::AgentAlreadyRegistered {
                    name: agent.name().to_string(),
                });
            }
            for (&resource, &max) in agent.max_needs() {
                let capacity = state
                    .resources
                    .get(&resource)
                    .map(|entry| entry.total_capacity())
                    .ok_or(WardenError::ResourceNotFound(resource))?;
                if max > capacity {
                    return Err(WardenError::ResourceCapacityExceeded {
                        resource,
                        requested: max,
                        capacity,
                    });
                }
            }

            let assigned = state.next_agent_id;
            state.next_agent_id += 1;
            agent.set_id(assigned);
            agent.set_state(AgentState::Registered);
            state
                .estimator
                .set_agent_demand_mode(assigned, agent.demand_mode());
            if state.config.progress.enabled {
                state.progress.track_agent(assigned);
            }
            state.agent_names.insert(agent.name().to_string(), assigned);

            let mut output = OpOutput::default();
            output.events.push(
                MonitorEvent::new(
                    EventType::AgentRegistered,
                    format!("agent '{}' registered", agent.name()),
                )
                .with_agent(assigned),
            );
            state.agents.insert(assigned, agent);
            (output, assigned)
        };
        self.deliver(output);
        Ok(assigned)
    }

    /// Deregister an agent
    ///
    /// Releases everything it holds, cancels its pending requests,
    /// removes its delegation edges, and frees its name.
    pub fn deregister_agent(&self, agent: AgentId) -> WardenResult<()> {
        let output = {
            let mut state = self.shared.state.lock();
            if !state.agents.contains_key(&agent) {
                return Err(WardenError::AgentNotFound(agent));
            }
            let mut output = OpOutput::default();

            // Held units go back to availability
            let held: Vec<(ResourceId, u64)> = state.agents[&agent]
                .allocations()
                .iter()
                .map(|(&resource, &units)| (resource, units))
                .collect();
            for (resource, units) in held {
                state.release_units(agent, resource, units, &mut output);
            }

            // Pending requests become cancelled
            let mut index = 0;
            while index < state.pending.len() {
                if state.pending[index].record.agent_id() == agent {
                    let entry = state.pending.remove(index);
                    state.finish_pending(entry, RequestStatus::Cancelled, &mut output);
                } else {
                    index += 1;
                }
            }

            // Delegation edges touching the agent disappear
            for (from, to) in state.delegations.remove_agent(agent) {
                output.events.push(
                    MonitorEvent::new(
                        EventType::DelegationCancelled,
                        format!("delegation {from} -> {to} dropped by deregistration"),
                    )
                    .with_agent(from),
                );
            }

            state.estimator.remove_agent(agent);
            state.progress.remove_agent(agent);
            state.cumulative_grants.remove(&agent);
            let mut record = state.agents.remove(&agent).unwrap();
            state.agent_names.remove(record.name());
            record.set_state(AgentState::Deregistered);

            output.events.push(
                MonitorEvent::new(
                    EventType::AgentDeregistered,
                    format!("agent '{}' deregistered", record.name()),
                )
                .with_agent(agent),
            );
            self.shared.wake.notify_all();
            output
        };
        self.deliver(output);
        Ok(())
    }

    /// Raise or lower an agent's declared maximum need
    pub fn update_agent_max_claim(
        &self,
        agent: AgentId,
        resource: ResourceId,
        new_max: u64,
    ) -> WardenResult<()> {
        let mut state = self.shared.state.lock();
        let capacity = state
            .resources
            .get(&resource)
            .map(|entry| entry.total_capacity())
            .ok_or(WardenError::ResourceNotFound(resource))?;
        let held = state
            .agents
            .get(&agent)
            .ok_or(WardenError::AgentNotFound(agent))?
            .allocation(resource);
        if new_max < held {
            return Err(WardenError::MaxClaimExceeded {
                agent,
                resource,
                requested: new_max,
                declared: held,
            });
        }
        if new_max > capacity {
            return Err(WardenError::ResourceCapacityExceeded {
                resource,
                requested: new_max,
                capacity,
            });
        }
        state
            .agents
            .get_mut(&agent)
            .unwrap()
            .set_max_need(resource, new_max);
        self.shared.wake.notify_all();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------

    /// Request units of one resource, blocking until a terminal status
    ///
    /// Returns `Pending` instead of blocking when no background
    /// processor is running (serial embedding).
    pub fn request_resources(
        &self,
        agent: AgentId,
        resource: ResourceId,
        quantity: u64,
        timeout: Option<Duration>,
    ) -> WardenResult<RequestStatus> {
        let demands = [(resource, quantity)].into_iter().collect();
        self.request_and_wait(agent, demands, timeout, None, false)
    }

    /// Like `request_resources`, scheduling the request at an explicit
    /// priority instead of the agent's
    pub fn request_resources_with_priority(
        &self,
        agent: AgentId,
        resource: ResourceId,
        quantity: u64,
        timeout: Option<Duration>,
        priority: u32,
    ) -> WardenResult<RequestStatus> {
        let demands = [(resource, quantity)].into_iter().collect();
        self.request_and_wait(agent, demands, timeout, Some(priority), false)
    }

    /// Atomic multi-resource request, blocking until a terminal status
    ///
    /// The whole demand map is granted or nothing is; partial grants
    /// never occur.
    pub fn request_resources_batch(
        &self,
        agent: AgentId,
        demands: BTreeMap<ResourceId, u64>,
        timeout: Option<Duration>,
    ) -> WardenResult<RequestStatus> {
        self.request_and_wait(agent, demands, timeout, None, false)
    }

    /// Like `request_resources`, but adaptive/hybrid agents are admitted
    /// against the estimator's projected maxima
    pub fn request_resources_adaptive(
        &self,
        agent: AgentId,
        resource: ResourceId,
        quantity: u64,
        timeout: Option<Duration>,
    ) -> WardenResult<RequestStatus> {
        let demands = [(resource, quantity)].into_iter().collect();
        self.request_and_wait(agent, demands, timeout, None, true)
    }

    /// Submit without blocking; the returned handle resolves to the
    /// terminal status
    pub fn request_resources_async(
        &self,
        agent: AgentId,
        resource: ResourceId,
        quantity: u64,
        timeout: Option<Duration>,
    ) -> WardenResult<FutureRequestStatus> {
        let demands = [(resource, quantity)].into_iter().collect();
        let (output, result) = self.submit(agent, demands, timeout, None, false, None);
        self.deliver(output);
        let (request_id, slot) = result?;
        Ok(FutureRequestStatus::new(request_id, slot))
    }

    /// Batch variant of `request_resources_async`
    pub fn request_resources_batch_async(
        &self,
        agent: AgentId,
        demands: BTreeMap<ResourceId, u64>,
        timeout: Option<Duration>,
    ) -> WardenResult<FutureRequestStatus> {
        let (output, result) = self.submit(agent, demands, timeout, None, false, None);
        self.deliver(output);
        let (request_id, slot) = result?;
        Ok(FutureRequestStatus::new(request_id, slot))
    }

    /// Submit without blocking; `callback(request_id, status)` fires
    /// exactly once, on the processor thread
    pub fn request_resources_callback(
        &self,
        agent: AgentId,
        resource: ResourceId,
        quantity: u64,
        timeout: Option<Duration>,
        callback: impl FnOnce(RequestId, RequestStatus) + Send + 'static,
    ) -> WardenResult<RequestId> {
        let demands = [(resource, quantity)].into_iter().collect();
        let (output, result) = self.submit(agent, demands, timeout, None, false, Some(Box::new(callback)));
        self.deliver(output);
        let (request_id, _slot) = result?;
        Ok(request_id)
    }

    fn request_and_wait(
        &self,
        agent: AgentId,
        demands: BTreeMap<ResourceId, u64>,
        timeout: Option<Duration>,
        priority_override: Option<u32>,
        adaptive: bool,
    ) -> WardenResult<RequestStatus> {
        let (output, result) = self.submit(agent, demands, timeout, priority_override, adaptive, None);
        self.deliver(output);
        let (_request_id, slot) = result?;
        if let Some(status) = slot.peek() {
            return Ok(status);
        }
        if !self.has_worker() {
            // Serial embedding: nothing else can complete the wait
            return Ok(RequestStatus::Pending);
        }
        Ok(slot.wait())
    }

    /// Cancel a pending request; granted requests cannot be cancelled
    pub fn cancel_request(&self, request_id: RequestId) -> WardenResult<()> {
        let output = {
            let mut state = self.shared.state.lock();
            let index = state
                .pending
                .iter()
                .position(|entry| entry.record.id() == request_id)
                .ok_or(WardenError::InvalidRequest {
                    reason: format!("request {request_id} is not pending"),
                })?;
            let entry = state.pending.remove(index);
            let mut output = OpOutput::default();
            state.finish_pending(entry, RequestStatus::Cancelled, &mut output);
            self.shared.wake.notify_all();
            output
        };
        self.deliver(output);
        Ok(())
    }

    /// Return units to availability, clamped to the held amount
    pub fn release_resources(
        &self,
        agent: AgentId,
        resource: ResourceId,
        quantity: u64,
    ) -> WardenResult<()> {
        let output = {
            let mut state = self.shared.state.lock();
            if !state.agents.contains_key(&agent) {
                return Err(WardenError::AgentNotFound(agent));
            }
            if !state.resources.contains_key(&resource) {
                return Err(WardenError::ResourceNotFound(resource));
            }
            let mut output = OpOutput::default();
            state.release_units(agent, resource, quantity, &mut output);
            state.refresh_agent_state(agent);
            self.shared.wake.notify_all();
            output
        };
        self.deliver(output);
        Ok(())
    }

    /// Release everything an agent holds, optionally of one resource
    pub fn release_all_resources(
        &self,
        agent: AgentId,
        resource: Option<ResourceId>,
    ) -> WardenResult<()> {
        let output = {
            let mut state = self.shared.state.lock();
            if !state.agents.contains_key(&agent) {
                return Err(WardenError::AgentNotFound(agent));
            }
            let mut output = OpOutput::default();
            let held: Vec<(ResourceId, u64)> = state.agents[&agent]
                .allocations()
                .iter()
                .filter(|(&id, _)| resource.map_or(true, |wanted| wanted == id))
                .map(|(&id, &units)| (id, units))
                .collect();
            for (id, units) in held {
                state.release_units(agent, id, units, &mut output);
            }
            state.refresh_agent_state(agent);
            self.shared.wake.notify_all();
            output
        };
        self.deliver(output);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Delegation
    // ------------------------------------------------------------------

    /// Report that `from` is waiting on `to`
    ///
    /// Detects whether the new edge closes a cycle and applies the
    /// configured `CycleAction`.
    pub fn report_delegation(
        &self,
        from: AgentId,
        to: AgentId,
        task_description: impl Into<String>,
    ) -> WardenResult<DelegationResult> {
        let task = task_description.into();
        let (output, result) = {
            let mut state = self.shared.state.lock();
            if !state.agents.contains_key(&from) {
                return Err(WardenError::AgentNotFound(from));
            }
            if !state.agents.contains_key(&to) {
                return Err(WardenError::AgentNotFound(to));
            }
            if from == to {
                return Err(WardenError::InvalidRequest {
                    reason: format!("agent {from} cannot delegate to itself"),
                });
            }

            let mut output = OpOutput::default();
            let cycle = if state.config.delegation.enabled {
                state.delegations.would_create_cycle(from, to)
            } else {
                None
            };

            let result = match cycle {
                None => {
                    state.delegations.insert_edge(from, to, task);
                    output.events.push(delegation_reported_event(from, to));
                    DelegationResult {
                        accepted: true,
                        cycle_detected: false,
                        cycle_path: Vec::new(),
                    }
                }
                Some(path) => {
                    output.events.push(
                        MonitorEvent::new(
                            EventType::DelegationCycleDetected,
                            format!("delegation {from} -> {to} closes cycle {path:?}"),
                        )
                        .with_agent(from),
                    );
                    match state.config.delegation.cycle_action {
                        CycleAction::RejectDelegation => DelegationResult {
                            accepted: false,
                            cycle_detected: true,
                            cycle_path: path,
                        },
                        CycleAction::BreakCycle => {
                            if let Some((broken_from, broken_to)) =
                                state.delegations.newest_edge_on_cycle(&path)
                            {
                                state.delegations.remove_edge(broken_from, broken_to);
                                output.events.push(
                                    MonitorEvent::new(
                                        EventType::DelegationCancelled,
                                        format!(
                                            "delegation {broken_from} -> {broken_to} \
                                             dropped to break a cycle"
                                        ),
                                    )
                                    .with_agent(broken_from),
                                );
                            }
                            state.delegations.insert_edge(from, to, task);
                            output.events.push(delegation_reported_event(from, to));
                            DelegationResult {
                                accepted: true,
                                cycle_detected: true,
                                cycle_path: path,
                            }
                        }
                        CycleAction::AllowButWarn => {
                            state.delegations.insert_edge(from, to, task);
                            output.events.push(delegation_reported_event(from, to));
                            DelegationResult {
                                accepted: true,
                                cycle_detected: true,
                                cycle_path: path,
                            }
                        }
                    }
                }
            };
            self.shared.wake.notify_all();
            (output, result)
        };
        self.deliver(output);
        Ok(result)
    }

    /// Mark a delegation finished and remove its edge
    pub fn complete_delegation(&self, from: AgentId, to: AgentId) -> WardenResult<()> {
        self.remove_delegation(from, to, EventType::DelegationCompleted)
    }

    /// Abandon a delegation and remove its edge
    pub fn cancel_delegation(&self, from: AgentId, to: AgentId) -> WardenResult<()> {
        self.remove_delegation(from, to, EventType::DelegationCancelled)
    }

    fn remove_delegation(
        &self,
        from: AgentId,
        to: AgentId,
        event_type: EventType,
    ) -> WardenResult<()> {
        let output = {
            let mut state = self.shared.state.lock();
            if !state.delegations.remove_edge(from, to) {
                return Err(WardenError::InvalidRequest {
                    reason: format!("no delegation {from} -> {to}"),
                });
            }
            let mut output = OpOutput::default();
            let verb = if event_type == EventType::DelegationCompleted {
                "completed"
            } else {
                "cancelled"
            };
            output.events.push(
                MonitorEvent::new(event_type, format!("delegation {from} -> {to} {verb}"))
                    .with_agent(from),
            );
            self.shared.wake.notify_all();
            output
        };
        self.deliver(output);
        Ok(())
    }

    /// Any delegation cycle currently in the graph
    pub fn find_delegation_cycle(&self) -> Option<Vec<AgentId>> {
        self.shared.state.lock().delegations.find_cycle()
    }

    // ------------------------------------------------------------------
    // Progress
    // ------------------------------------------------------------------

    /// Record forward progress for an agent
    pub fn report_progress(
        &self,
        agent: AgentId,
        metric: &str,
        value: f64,
    ) -> WardenResult<()> {
        let output = {
            let mut state = self.shared.state.lock();
            if !state.agents.contains_key(&agent) {
                return Err(WardenError::AgentNotFound(agent));
            }
            let resolved = state.progress.report(agent, metric, value);
            let mut output = OpOutput::default();
            output.events.push(
                MonitorEvent::new(
                    EventType::AgentProgressReported,
                    format!("agent {agent} progress: {metric} = {value}"),
                )
                .with_agent(agent)
                .with_value(value),
            );
            if resolved {
                output.events.push(
                    MonitorEvent::new(
                        EventType::AgentStallResolved,
                        format!("agent {agent} resumed progress"),
                    )
                    .with_agent(agent),
                );
            }
            output
        };
        self.deliver(output);
        Ok(())
    }

    /// Whether the agent has been silent past its stall threshold
    pub fn is_agent_stalled(&self, agent: AgentId) -> WardenResult<bool> {
        let state = self.shared.state.lock();
        if !state.agents.contains_key(&agent) {
            return Err(WardenError::AgentNotFound(agent));
        }
        Ok(state.progress.is_stalled(agent))
    }

    /// Override one agent's stall threshold
    pub fn set_agent_stall_threshold(
        &self,
        agent: AgentId,
        threshold: Duration,
    ) -> WardenResult<()> {
        let mut state = self.shared.state.lock();
        if !state.agents.contains_key(&agent) {
            return Err(WardenError::AgentNotFound(agent));
        }
        state.progress.set_threshold(agent, threshold);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Demand estimation
    // ------------------------------------------------------------------

    /// Switch an agent's demand mode
    pub fn set_agent_demand_mode(&self, agent: AgentId, mode: DemandMode) -> WardenResult<()> {
        let output = {
            let mut state = self.shared.state.lock();
            if !state.agents.contains_key(&agent) {
                return Err(WardenError::AgentNotFound(agent));
            }
            state.estimator.set_agent_demand_mode(agent, mode);
            state.agents.get_mut(&agent).unwrap().set_demand_mode(mode);
            let mut output = OpOutput::default();
            output.events.push(
                MonitorEvent::new(
                    EventType::AdaptiveDemandModeChanged,
                    format!("agent {agent} demand mode set to {mode:?}"),
                )
                .with_agent(agent),
            );
            output
        };
        self.deliver(output);
        Ok(())
    }

    /// The agent's current demand mode
    pub fn get_agent_demand_mode(&self, agent: AgentId) -> WardenResult<DemandMode> {
        let state = self.shared.state.lock();
        if !state.agents.contains_key(&agent) {
            return Err(WardenError::AgentNotFound(agent));
        }
        Ok(state.estimator.get_agent_demand_mode(agent))
    }

    /// Observed demand statistics for one (agent, resource) pair
    pub fn usage_stats(&self, agent: AgentId, resource: ResourceId) -> UsageStats {
        self.shared.state.lock().estimator.usage_stats(agent, resource)
    }

    // ------------------------------------------------------------------
    // Policy
    // ------------------------------------------------------------------

    /// Select one of the built-in scheduling policies
    pub fn set_policy_config(&self, config: PolicyConfig) {
        let mut state = self.shared.state.lock();
        state.policy = config.build();
        self.shared.wake.notify_all();
    }

    /// Install a custom scheduling policy
    pub fn set_scheduling_policy(&self, policy: Box<dyn SchedulingPolicy>) {
        let mut state = self.shared.state.lock();
        state.policy = policy;
        self.shared.wake.notify_all();
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Whether the current allocation admits a completion schedule
    pub fn is_safe(&self) -> bool {
        let (output, verdict) = {
            let state = self.shared.state.lock();
            let result = SafetyChecker::check_safety(&state.safety_input());
            let mut output = OpOutput::default();
            output.events.push(
                MonitorEvent::new(EventType::SafetyCheckPerformed, result.reason.clone())
                    .with_value(if result.is_safe { 1.0 } else { 0.0 }),
            );
            if !result.is_safe {
                output.events.push(MonitorEvent::new(
                    EventType::UnsafeStateDetected,
                    result.reason.clone(),
                ));
            }
            (output, result.is_safe)
        };
        self.deliver(output);
        verdict
    }

    /// Immutable view of the whole manager
    pub fn get_snapshot(&self) -> SystemSnapshot {
        self.shared.state.lock().build_snapshot()
    }

    /// Copy of a registered resource
    pub fn get_resource(&self, resource: ResourceId) -> WardenResult<Resource> {
        self.shared
            .state
            .lock()
            .resources
            .get(&resource)
            .cloned()
            .ok_or(WardenError::ResourceNotFound(resource))
    }

    /// Copy of a registered agent
    pub fn get_agent(&self, agent: AgentId) -> WardenResult<Agent> {
        self.shared
            .state
            .lock()
            .agents
            .get(&agent)
            .cloned()
            .ok_or(WardenError::AgentNotFound(agent))
    }

    /// Number of registered agents
    pub fn agent_count(&self) -> usize {
        self.shared.state.lock().agents.len()
    }

    /// Number of registered resources
    pub fn resource_count(&self) -> usize {
        self.shared.state.lock().resources.len()
    }

    /// Depth of the pending queue
    pub fn pending_request_count(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn has_worker(&self) -> bool {
        self.shared.state.lock().has_worker
    }

    /// Validate, try to grant immediately, otherwise enqueue
    #[allow(clippy::type_complexity)]
    fn submit(
        &self,
        agent: AgentId,
        demands: BTreeMap<ResourceId, u64>,
        timeout: Option<Duration>,
        priority_override: Option<u32>,
        adaptive: bool,
        callback: Option<RequestCallback>,
    ) -> (OpOutput, WardenResult<(RequestId, Arc<CompletionSlot>)>) {
        let mut state = self.shared.state.lock();
        let mut output = OpOutput::default();

        // Step 1: validation
        if let Err(error) = state.validate_submission(agent, &demands) {
            return (output, Err(error));
        }

        // Demand samples feed the estimator regardless of outcome
        for (&resource, &quantity) in &demands {
            state.estimator.record_request(agent, resource, quantity);
            output.events.push(
                MonitorEvent::new(
                    EventType::DemandEstimateUpdated,
                    format!("agent {agent} demand sample {quantity} on resource {resource}"),
                )
                .with_agent(agent)
                .with_resource(resource)
                .with_value(quantity as f64),
            );
        }

        let request_id = state.next_request_id;
        state.next_request_id += 1;
        let submitted_seq = state.next_submit_seq;
        state.next_submit_seq += 1;

        let timeout = timeout.or(state.config.default_request_timeout);
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let priority = priority_override.unwrap_or_else(|| state.agents[&agent].priority());
        let submitted_at = Utc::now();
        let mut record = ResourceRequest::new(
            request_id,
            agent,
            demands.clone(),
            submitted_at,
            timeout.and_then(|timeout| {
                chrono::Duration::from_std(timeout)
                    .ok()
                    .map(|delta| submitted_at + delta)
            }),
            priority,
        );

        output.events.push(
            submission_event(&record)
                .with_agent(agent)
                .with_request(request_id),
        );

        let slot = CompletionSlot::new();

        // Step 2: immediate grant when available and safe
        let on_cycle = state.agent_on_delegation_cycle(agent);
        if !on_cycle
            && state.demands_available(&demands)
            && state.hypothetical_is_safe(agent, &demands, adaptive, true, &mut output)
        {
            state.apply_grant(agent, &demands);
            record.finish(RequestStatus::Granted);
            output.events.push(
                grant_event(&record)
                    .with_agent(agent)
                    .with_request(request_id),
            );
            state.refresh_agent_state(agent);
            state.queue_completion(
                Completion {
                    request_id,
                    status: RequestStatus::Granted,
                    slot: slot.clone(),
                    callback,
                },
                &mut output,
            );
            self.shared.wake.notify_all();
            return (output, Ok((request_id, slot)));
        }

        // Step 3: deny only what no reachable state could satisfy
        if !state.optimistically_feasible(agent, &demands) {
            record.finish(RequestStatus::Denied);
            output.events.push(
                MonitorEvent::new(
                    EventType::RequestDenied,
                    format!("request {request_id} can never be satisfied safely"),
                )
                .with_agent(agent)
                .with_request(request_id),
            );
            state.queue_completion(
                Completion {
                    request_id,
                    status: RequestStatus::Denied,
                    slot: slot.clone(),
                    callback,
                },
                &mut output,
            );
            return (output, Ok((request_id, slot)));
        }

        // Step 4: enqueue for the processor
        state.pending.push(PendingRequest {
            record,
            deadline,
            submitted_seq,
            adaptive,
            slot: slot.clone(),
            callback,
        });
        output.events.push(queue_size_event(state.pending.len()));
        state.refresh_agent_state(agent);
        self.shared.wake.notify_all();
        (output, Ok((request_id, slot)))
    }

    /// Dispatch events, completions, and snapshots outside the state lock
    fn deliver(&self, output: OpOutput) {
        deliver_output(&self.shared, output);
    }
}

impl Drop for ResourceManager {
    fn drop(&mut self) {
        self.stop();
    }
}

// ----------------------------------------------------------------------
// State internals
// ----------------------------------------------------------------------

impl ManagerState {
    fn validate_submission(
        &self,
        agent: AgentId,
        demands: &BTreeMap<ResourceId, u64>,
    ) -> WardenResult<()> {
        let agent_entry = self
            .agents
            .get(&agent)
            .ok_or(WardenError::AgentNotFound(agent))?;
        if demands.is_empty() {
            return Err(WardenError::InvalidRequest {
                reason: "empty demand map".to_string(),
            });
        }
        for (&resource, &quantity) in demands {
            if quantity < 1 {
                return Err(WardenError::InvalidRequest {
                    reason: format!("quantity for resource {resource} must be at least 1"),
                });
            }
            let capacity = self
                .resources
                .get(&resource)
                .map(|entry| entry.total_capacity())
                .ok_or(WardenError::ResourceNotFound(resource))?;
            if quantity > capacity {
                return Err(WardenError::ResourceCapacityExceeded {
                    resource,
                    requested: quantity,
                    capacity,
                });
            }
            let held = agent_entry.allocation(resource);
            let declared = agent_entry.max_need(resource);
            if held + quantity > declared {
                return Err(WardenError::MaxClaimExceeded {
                    agent,
                    resource,
                    requested: held + quantity,
                    declared,
                });
            }
        }
        if self.config.pending_queue_capacity > 0
            && self.pending.len() >= self.config.pending_queue_capacity
        {
            return Err(WardenError::QueueFull {
                capacity: self.config.pending_queue_capacity,
            });
        }
        Ok(())
    }

    fn safety_input(&self) -> SafetyCheckInput {
        SafetyCheckInput {
            total: self
                .resources
                .iter()
                .map(|(&id, resource)| (id, resource.total_capacity()))
                .collect(),
            available: self
                .resources
                .iter()
                .map(|(&id, resource)| (id, resource.available()))
                .collect(),
            allocation: self
                .agents
                .iter()
                .map(|(&id, agent)| (id, agent.allocations().clone()))
                .collect(),
            max_need: self
                .agents
                .iter()
                .map(|(&id, agent)| (id, agent.max_needs().clone()))
                .collect(),
        }
    }

    fn demands_available(&self, demands: &BTreeMap<ResourceId, u64>) -> bool {
        demands.iter().all(|(&resource, &quantity)| {
            self.resources
                .get(&resource)
                .map(|entry| quantity <= entry.available())
                .unwrap_or(false)
        })
    }

    fn agent_on_delegation_cycle(&self, agent: AgentId) -> bool {
        self.config.delegation.enabled && self.delegations.agents_on_cycles().contains(&agent)
    }

    /// Probe a hypothetical grant, optionally via the probabilistic path
    ///
    /// `emit` controls whether check events are pushed; the processor's
    /// fixed-point loop probes silently and lets `RequestGranted` speak
    /// for the successful probe.
    fn hypothetical_is_safe(
        &self,
        agent: AgentId,
        demands: &BTreeMap<ResourceId, u64>,
        adaptive: bool,
        emit: bool,
        output: &mut OpOutput,
    ) -> bool {
        let input = self.safety_input();
        let mode = self.estimator.get_agent_demand_mode(agent);
        let probabilistic =
            adaptive && self.config.adaptive.enabled && mode != DemandMode::Static;

        if probabilistic {
            // Apply the grant first, then project maxima from samples
            let mut projected = input;
            for (&resource, &quantity) in demands {
                let available = projected.available.get_mut(&resource);
                match available {
                    Some(available) if *available >= quantity => *available -= quantity,
                    _ => return false,
                }
                *projected
                    .allocation
                    .entry(agent)
                    .or_default()
                    .entry(resource)
                    .or_insert(0) += quantity;
            }
            let modes: BTreeMap<AgentId, DemandMode> = self
                .agents
                .keys()
                .map(|&id| (id, self.estimator.get_agent_demand_mode(id)))
                .collect();
            let result = SafetyChecker::check_safety_probabilistic(
                &projected,
                self.config.adaptive.default_confidence_level,
                &self.estimator,
                &modes,
            );
            if emit {
                output.events.push(
                    MonitorEvent::new(EventType::ProbabilisticSafetyCheck, result.reason.clone())
                        .with_agent(agent)
                        .with_value(result.max_safe_confidence),
                );
            }
            result.is_safe
        } else {
            let result = SafetyChecker::check_hypothetical_batch(&input, agent, demands);
            if emit {
                output.events.push(
                    MonitorEvent::new(EventType::SafetyCheckPerformed, result.reason.clone())
                        .with_agent(agent)
                        .with_value(if result.is_safe { 1.0 } else { 0.0 }),
                );
                if !result.is_safe {
                    output.events.push(
                        MonitorEvent::new(EventType::UnsafeStateDetected, result.reason.clone())
                            .with_agent(agent),
                    );
                }
            }
            result.is_safe
        }
    }

    /// Safe even if every other agent released everything it holds?
    ///
    /// Failing this optimistic projection means no reachable state can
    /// satisfy the request, which is the bar for `Denied`.
    fn optimistically_feasible(&self, agent: AgentId, demands: &BTreeMap<ResourceId, u64>) -> bool {
        let mut input = self.safety_input();
        let others: Vec<AgentId> = input
            .allocation
            .keys()
            .copied()
            .filter(|&id| id != agent)
            .collect();
        for other in others {
            let row = input.allocation.get_mut(&other).unwrap();
            for (&resource, units) in row.iter_mut() {
                if let Some(available) = input.available.get_mut(&resource) {
                    *available += *units;
                }
                *units = 0;
            }
        }
        SafetyChecker::check_hypothetical_batch(&input, agent, demands).is_safe
    }

    fn apply_grant(&mut self, agent: AgentId, demands: &BTreeMap<ResourceId, u64>) {
        for (&resource, &quantity) in demands {
            self.resources.get_mut(&resource).unwrap().reserve(quantity);
            self.agents.get_mut(&agent).unwrap().grant(resource, quantity);
            *self.cumulative_grants.entry(agent).or_insert(0) += quantity;
        }
    }

    /// Return up to `quantity` units, clamped to the held amount
    fn release_units(
        &mut self,
        agent: AgentId,
        resource: ResourceId,
        quantity: u64,
        output: &mut OpOutput,
    ) -> u64 {
        let released = self
            .agents
            .get_mut(&agent)
            .map(|entry| entry.release(resource, quantity))
            .unwrap_or(0);
        if released > 0 {
            self.resources.get_mut(&resource).unwrap().restore(released);
            output.events.push(
                MonitorEvent::new(
                    EventType::ResourcesReleased,
                    format!("agent {agent} released {released} of resource {resource}"),
                )
                .with_agent(agent)
                .with_resource(resource)
                .with_value(released as f64),
            );
        }
        released
    }

    fn has_pending_for(&self, agent: AgentId) -> bool {
        self.pending
            .iter()
            .any(|entry| entry.record.agent_id() == agent)
    }

    fn refresh_agent_state(&mut self, agent: AgentId) {
        let has_pending = self.has_pending_for(agent);
        if let Some(entry) = self.agents.get_mut(&agent) {
            let next = if has_pending {
                AgentState::Waiting
            } else if entry.holds_nothing() {
                AgentState::Registered
            } else {
                AgentState::Active
            };
            entry.set_state(next);
        }
    }

    /// Finish a dequeued request with a terminal status
    fn finish_pending(
        &mut self,
        mut entry: PendingRequest,
        status: RequestStatus,
        output: &mut OpOutput,
    ) {
        entry.record.finish(status);
        let agent = entry.record.agent_id();
        let request_id = entry.record.id();
        let event_type = match status {
            RequestStatus::Cancelled => EventType::RequestCancelled,
            RequestStatus::TimedOut => EventType::RequestTimedOut,
            RequestStatus::Denied => EventType::RequestDenied,
            RequestStatus::Granted => EventType::RequestGranted,
            RequestStatus::Pending => unreachable!("finish requires a terminal status"),
        };
        output.events.push(
            MonitorEvent::new(
                event_type,
                format!("request {request_id} finished as {status:?}"),
            )
            .with_agent(agent)
            .with_request(request_id),
        );
        output.events.push(queue_size_event(self.pending.len()));
        output.completions.push(Completion {
            request_id,
            status,
            slot: entry.slot,
            callback: entry.callback,
        });
        self.refresh_agent_state(agent);
    }

    /// Route a completion through the worker when callbacks must run
    /// there; otherwise deliver it with the current operation
    fn queue_completion(&mut self, completion: Completion, output: &mut OpOutput) {
        if completion.callback.is_some() && self.has_worker {
            self.deferred.push(completion);
        } else {
            output.completions.push(completion);
        }
    }

    fn build_views(&self) -> Vec<PendingView> {
        self.pending
            .iter()
            .map(|entry| {
                let agent = entry.record.agent_id();
                let remaining_need = entry
                    .record
                    .demands()
                    .keys()
                    .map(|&resource| {
                        self.agents
                            .get(&agent)
                            .map(|entry| entry.remaining_need(resource))
                            .unwrap_or(0)
                    })
                    .sum();
                PendingView {
                    request_id: entry.record.id(),
                    agent_id: agent,
                    priority: entry.record.priority(),
                    submitted_seq: entry.submitted_seq,
                    remaining_need,
                    deadline: entry.deadline,
                    cumulative_granted: self.cumulative_grants.get(&agent).copied().unwrap_or(0),
                }
            })
            .collect()
    }

    /// One full processor iteration: admission fixed point, timeout
    /// scan, stall sweep, periodic snapshot, deferred notifications
    fn run_iteration(&mut self, now: Instant) -> OpOutput {
        let mut output = OpOutput::default();
        self.process_queue(&mut output);
        self.expire_requests(now, &mut output);
        self.sweep_progress(now, &mut output);
        output.snapshot = self.maybe_snapshot(now);
        output.completions.append(&mut self.deferred);
        output
    }

    /// Walk the pending queue in policy order until no grant succeeds
    fn process_queue(&mut self, output: &mut OpOutput) {
        loop {
            let blocked: BTreeSet<AgentId> = if self.config.delegation.enabled {
                self.delegations.agents_on_cycles()
            } else {
                BTreeSet::new()
            };
            let views = self.build_views();
            let order = self.policy.order(&views);

            let mut progressed = false;
            for request_id in order {
                let Some(index) = self
                    .pending
                    .iter()
                    .position(|entry| entry.record.id() == request_id)
                else {
                    continue;
                };
                let agent = self.pending[index].record.agent_id();
                if blocked.contains(&agent) {
                    continue;
                }
                let demands = self.pending[index].record.demands().clone();
                if !self.demands_available(&demands) {
                    continue;
                }
                let adaptive = self.pending[index].adaptive;
                if !self.hypothetical_is_safe(agent, &demands, adaptive, false, output) {
                    continue;
                }

                let mut entry = self.pending.remove(index);
                self.apply_grant(agent, &demands);
                entry.record.finish(RequestStatus::Granted);
                output.events.push(
                    grant_event(&entry.record)
                        .with_agent(agent)
                        .with_request(entry.record.id()),
                );
                output.events.push(queue_size_event(self.pending.len()));
                output.completions.push(Completion {
                    request_id: entry.record.id(),
                    status: RequestStatus::Granted,
                    slot: entry.slot,
                    callback: entry.callback,
                });
                self.refresh_agent_state(agent);
                progressed = true;
            }
            if !progressed {
                break;
            }
        }
    }

    /// Time out requests whose deadline has passed
    ///
    /// Capacity shrinks or lowered claims that invalidate a pending
    /// request are treated as transient (both can be raised again), so
    /// such requests keep waiting for their deadline.
    fn expire_requests(&mut self, now: Instant, output: &mut OpOutput) {
        let mut index = 0;
        while index < self.pending.len() {
            let timed_out = self.pending[index]
                .deadline
                .map(|deadline| now >= deadline)
                .unwrap_or(false);
            if timed_out {
                let entry = self.pending.remove(index);
                self.finish_pending(entry, RequestStatus::TimedOut, output);
            } else {
                index += 1;
            }
        }
    }

    fn sweep_progress(&mut self, now: Instant, output: &mut OpOutput) {
        if !self.config.progress.enabled {
            return;
        }
        if now.duration_since(self.last_progress_sweep) < self.config.progress.check_interval {
            return;
        }
        self.last_progress_sweep = now;

        for agent in self.progress.sweep(now) {
            output.events.push(
                MonitorEvent::new(
                    EventType::AgentStalled,
                    format!("agent {agent} made no progress within its stall threshold"),
                )
                .with_agent(agent),
            );
            if self.config.progress.auto_release_on_stall {
                let held: Vec<(ResourceId, u64)> = self
                    .agents
                    .get(&agent)
                    .map(|entry| {
                        entry
                            .allocations()
                            .iter()
                            .map(|(&resource, &units)| (resource, units))
                            .collect()
                    })
                    .unwrap_or_default();
                let mut total = 0;
                for (resource, units) in held {
                    total += self.release_units(agent, resource, units, output);
                }
                if total > 0 {
                    output.events.push(
                        MonitorEvent::new(
                            EventType::AgentResourcesAutoReleased,
                            format!("released {total} units held by stalled agent {agent}"),
                        )
                        .with_agent(agent)
                        .with_value(total as f64),
                    );
                    self.refresh_agent_state(agent);
                }
            }
        }
    }

    fn maybe_snapshot(&mut self, now: Instant) -> Option<SystemSnapshot> {
        if self.config.snapshot_interval.is_zero() {
            return None;
        }
        if now.duration_since(self.last_snapshot_at) < self.config.snapshot_interval {
            return None;
        }
        self.last_snapshot_at = now;
        Some(self.build_snapshot())
    }

    fn build_snapshot(&self) -> SystemSnapshot {
        let verdict = SafetyChecker::check_safety(&self.safety_input());
        SystemSnapshot {
            timestamp: Utc::now(),
            total_resources: self
                .resources
                .iter()
                .map(|(&id, resource)| (id, resource.total_capacity()))
                .collect(),
            available_resources: self
                .resources
                .iter()
                .map(|(&id, resource)| (id, resource.available()))
                .collect(),
            agents: self
                .agents
                .values()
                .map(|agent| AgentAllocationSnapshot {
                    agent_id: agent.id(),
                    name: agent.name().to_string(),
                    state: agent.state(),
                    priority: agent.priority(),
                    allocations: agent.allocations().clone(),
                    max_needs: agent.max_needs().clone(),
                })
                .collect(),
            pending_requests: self
                .pending
                .iter()
                .map(|entry| entry.record.clone())
                .collect(),
            is_safe: verdict.is_safe,
        }
    }
}

// ----------------------------------------------------------------------
// Worker loop
// ----------------------------------------------------------------------

fn worker_loop(shared: Arc<Shared>) {
    loop {
        let output = {
            let mut state = shared.state.lock();
            if !state.running {
                break;
            }
            let poll = state.config.processor_poll_interval;
            shared.wake.wait_until(&mut state, Instant::now() + poll);
            if !state.running {
                break;
            }
            state.run_iteration(Instant::now())
        };
        deliver_output(&shared, output);
    }
}

/// Dispatch one operation's output with no lock held
fn deliver_output(shared: &Shared, output: OpOutput) {
    if !output.events.is_empty() || output.snapshot.is_some() {
        let monitor = shared.monitor.lock().clone();
        if let Some(monitor) = monitor {
            for event in &output.events {
                monitor.on_event(event);
            }
            if let Some(snapshot) = &output.snapshot {
                monitor.on_snapshot(snapshot);
            }
        }
    }
    for completion in output.completions {
        completion.slot.fire(completion.status);
        if let Some(callback) = completion.callback {
            callback(completion.request_id, completion.status);
        }
    }
}

// ----------------------------------------------------------------------
// Event helpers
// ----------------------------------------------------------------------

fn submission_event(record: &ResourceRequest) -> MonitorEvent {
    let event = MonitorEvent::new(
        EventType::RequestSubmitted,
        if record.is_batch() {
            format!(
                "batch request for {}",
                serde_json::to_string(record.demands()).unwrap_or_default()
            )
        } else {
            let (&resource, &quantity) = record.demands().iter().next().unwrap();
            format!("request for {quantity} of resource {resource}")
        },
    )
    .with_value(record.total_quantity() as f64);
    match record.demands().len() {
        1 => event.with_resource(*record.demands().keys().next().unwrap()),
        _ => event,
    }
}

fn grant_event(record: &ResourceRequest) -> MonitorEvent {
    let event = MonitorEvent::new(
        EventType::RequestGranted,
        if record.is_batch() {
            format!(
                "granted batch {}",
                serde_json::to_string(record.demands()).unwrap_or_default()
            )
        } else {
            let (&resource, &quantity) = record.demands().iter().next().unwrap();
            format!("granted {quantity} of resource {resource}")
        },
    )
    .with_value(record.total_quantity() as f64);
    match record.demands().len() {
        1 => event.with_resource(*record.demands().keys().next().unwrap()),
        _ => event,
    }
}

fn queue_size_event(depth: usize) -> MonitorEvent {
    MonitorEvent::new(
        EventType::QueueSizeChanged,
        format!("pending queue depth {depth}"),
    )
    .with_value(depth as f64)
}

fn delegation_reported_event(from: AgentId, to: AgentId) -> MonitorEvent {
    MonitorEvent::new(
        EventType::DelegationReported,
        format!("agent {from} delegated to agent {to}"),
    )
    .with_agent(from)
}
