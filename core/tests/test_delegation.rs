//! Integration tests for delegation reporting and cycle handling

use std::time::Duration;

use agent_warden_core_rs::{
    Agent, Config, CycleAction, DelegationConfig, RequestStatus, Resource, ResourceCategory,
    ResourceManager, WardenError,
};

fn delegation_manager(cycle_action: CycleAction) -> ResourceManager {
    let manager = ResourceManager::new(Config {
        default_request_timeout: Some(Duration::from_secs(2)),
        processor_poll_interval: Duration::from_millis(5),
        delegation: DelegationConfig {
            enabled: true,
            cycle_action,
        },
        ..Config::default()
    });
    manager.start();
    manager
}

fn three_agents(manager: &ResourceManager) -> (u64, u64, u64) {
    let a = manager
        .register_agent(Agent::new(0, "planner".to_string()))
        .unwrap();
    let b = manager
        .register_agent(Agent::new(0, "researcher".to_string()))
        .unwrap();
    let c = manager
        .register_agent(Agent::new(0, "writer".to_string()))
        .unwrap();
    (a, b, c)
}

#[test]
fn test_acyclic_delegations_accepted() {
    let manager = delegation_manager(CycleAction::RejectDelegation);
    let (a, b, c) = three_agents(&manager);

    let first = manager.report_delegation(a, b, "outline the report").unwrap();
    assert!(first.accepted);
    assert!(!first.cycle_detected);

    let second = manager.report_delegation(b, c, "collect sources").unwrap();
    assert!(second.accepted);
    assert!(manager.find_delegation_cycle().is_none());
    manager.stop();
}

#[test]
fn test_cycle_rejected_with_path() {
    let manager = delegation_manager(CycleAction::RejectDelegation);
    let (a, b, c) = three_agents(&manager);

    manager.report_delegation(a, b, "plan").unwrap();
    manager.report_delegation(b, c, "research").unwrap();

    // c -> a would close a -> b -> c -> a
    let result = manager.report_delegation(c, a, "review").unwrap();
    assert!(!result.accepted);
    assert!(result.cycle_detected);
    assert_eq!(result.cycle_path, vec![a, b, c, a]);

    // The rejected edge is not in the graph
    assert!(manager.find_delegation_cycle().is_none());
    manager.stop();
}

#[test]
fn test_break_cycle_drops_newest_edge() {
    let manager = delegation_manager(CycleAction::BreakCycle);
    let (a, b, c) = three_agents(&manager);

    manager.report_delegation(a, b, "plan").unwrap();
    manager.report_delegation(b, c, "research").unwrap();

    let result = manager.report_delegation(c, a, "review").unwrap();
    assert!(result.accepted);
    assert!(result.cycle_detected);

    // The most recently added edge on the cycle (b -> c) was dropped
    assert!(manager.find_delegation_cycle().is_none());

    // Re-reporting b -> c closes a fresh cycle, which is broken again
    let again = manager.report_delegation(b, c, "research").unwrap();
    assert!(again.accepted);
    assert!(again.cycle_detected);
    assert!(manager.find_delegation_cycle().is_none());
    manager.stop();
}

#[test]
fn test_allow_but_warn_keeps_cycle() {
    let manager = delegation_manager(CycleAction::AllowButWarn);
    let (a, b, _c) = three_agents(&manager);

    manager.report_delegation(a, b, "plan").unwrap();
    let result = manager.report_delegation(b, a, "counter-plan").unwrap();
    assert!(result.accepted);
    assert!(result.cycle_detected);

    let cycle = manager.find_delegation_cycle().expect("cycle should exist");
    assert_eq!(cycle.first(), cycle.last());
    manager.stop();
}

#[test]
fn test_complete_delegation_removes_edge() {
    let manager = delegation_manager(CycleAction::RejectDelegation);
    let (a, b, c) = three_agents(&manager);

    manager.report_delegation(a, b, "plan").unwrap();
    manager.report_delegation(b, c, "research").unwrap();
    manager.complete_delegation(a, b).unwrap();

    // With a -> b gone, c -> a no longer closes a cycle
    let result = manager.report_delegation(c, a, "review").unwrap();
    assert!(result.accepted);
    assert!(!result.cycle_detected);

    // Removing an edge twice is an error
    assert!(matches!(
        manager.complete_delegation(a, b).unwrap_err(),
        WardenError::InvalidRequest { .. }
    ));
    manager.stop();
}

#[test]
fn test_self_delegation_rejected() {
    let manager = delegation_manager(CycleAction::RejectDelegation);
    let (a, _b, _c) = three_agents(&manager);
    assert!(matches!(
        manager.report_delegation(a, a, "navel-gazing").unwrap_err(),
        WardenError::InvalidRequest { .. }
    ));
    manager.stop();
}

#[test]
fn test_deregistration_removes_touching_edges() {
    let manager = delegation_manager(CycleAction::RejectDelegation);
    let (a, b, c) = three_agents(&manager);

    manager.report_delegation(a, b, "plan").unwrap();
    manager.report_delegation(b, c, "research").unwrap();
    manager.deregister_agent(b).unwrap();

    // Both edges touched b; the graph is empty now
    let result = manager.report_delegation(c, a, "review").unwrap();
    assert!(result.accepted);
    assert!(!result.cycle_detected);
    manager.stop();
}

#[test]
fn test_agents_on_cycle_are_not_granted() {
    let manager = delegation_manager(CycleAction::AllowButWarn);
    manager
        .register_resource(Resource::new(
            1,
            "api".to_string(),
            ResourceCategory::ApiRateLimit,
            10,
        ))
        .unwrap();
    let a = manager
        .register_agent(Agent::new(0, "planner".to_string()).declare_max_need(1, 5))
        .unwrap();
    let b = manager
        .register_agent(Agent::new(0, "researcher".to_string()).declare_max_need(1, 5))
        .unwrap();

    // A standing cycle between the two agents
    manager.report_delegation(a, b, "plan").unwrap();
    manager.report_delegation(b, a, "counter-plan").unwrap();

    // Neither deadlocked agent is served, even though units are free
    let status = manager
        .request_resources(a, 1, 2, Some(Duration::from_millis(100)))
        .unwrap();
    assert_eq!(status, RequestStatus::TimedOut);

    // Resolving the cycle unblocks granting
    manager.complete_delegation(b, a).unwrap();
    assert_eq!(
        manager.request_resources(a, 1, 2, None).unwrap(),
        RequestStatus::Granted
    );
    manager.stop();
}
