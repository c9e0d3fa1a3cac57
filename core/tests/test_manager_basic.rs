//! Integration tests for manager lifecycle, registration, and queries

use std::time::Duration;

use agent_warden_core_rs::{
    Agent, AgentState, Config, Resource, ResourceCategory, ResourceManager, WardenError,
};

fn test_config() -> Config {
    Config {
        default_request_timeout: Some(Duration::from_secs(2)),
        processor_poll_interval: Duration::from_millis(5),
        ..Config::default()
    }
}

fn api_resource(id: u64, capacity: u64) -> Resource {
    Resource::new(id, format!("api_{id}"), ResourceCategory::ApiRateLimit, capacity)
}

#[test]
fn test_start_and_stop() {
    let manager = ResourceManager::new(test_config());
    assert!(!manager.is_running());
    manager.start();
    assert!(manager.is_running());
    manager.stop();
    assert!(!manager.is_running());
    // Stop is idempotent
    manager.stop();
}

#[test]
fn test_register_and_get_resource() {
    let manager = ResourceManager::new(test_config());
    manager.register_resource(api_resource(1, 10)).unwrap();

    let got = manager.get_resource(1).unwrap();
    assert_eq!(got.id(), 1);
    assert_eq!(got.name(), "api_1");
    assert_eq!(got.total_capacity(), 10);
    assert_eq!(got.available(), 10);
}

#[test]
fn test_duplicate_resource_id_rejected() {
    let manager = ResourceManager::new(test_config());
    manager.register_resource(api_resource(1, 10)).unwrap();
    let error = manager.register_resource(api_resource(1, 5)).unwrap_err();
    assert!(matches!(error, WardenError::InvalidRequest { .. }));
}

#[test]
fn test_register_agent_assigns_fresh_ids() {
    let manager = ResourceManager::new(test_config());
    manager.register_resource(api_resource(1, 10)).unwrap();

    let first = manager
        .register_agent(Agent::new(99, "alpha".to_string()).declare_max_need(1, 5))
        .unwrap();
    let second = manager
        .register_agent(Agent::new(99, "beta".to_string()).declare_max_need(1, 5))
        .unwrap();

    // The caller-supplied id (99) is advisory
    assert_ne!(first, second);
    assert_eq!(manager.agent_count(), 2);
    assert_eq!(manager.get_agent(first).unwrap().name(), "alpha");
    assert_eq!(manager.get_agent(second).unwrap().name(), "beta");
}

#[test]
fn test_duplicate_agent_name_rejected() {
    let manager = ResourceManager::new(test_config());
    manager
        .register_agent(Agent::new(0, "twin".to_string()))
        .unwrap();
    let error = manager
        .register_agent(Agent::new(1, "twin".to_string()))
        .unwrap_err();
    assert_eq!(
        error,
        WardenError::AgentAlreadyRegistered {
            name: "twin".to_string()
        }
    );
}

#[test]
fn test_declared_max_above_capacity_rejected() {
    let manager = ResourceManager::new(test_config());
    manager.register_resource(api_resource(1, 10)).unwrap();
    let error = manager
        .register_agent(Agent::new(0, "greedy".to_string()).declare_max_need(1, 11))
        .unwrap_err();
    assert!(matches!(
        error,
        WardenError::ResourceCapacityExceeded {
            resource: 1,
            requested: 11,
            capacity: 10,
        }
    ));
}

#[test]
fn test_max_agents_cap() {
    let config = Config {
        max_agents: 2,
        ..test_config()
    };
    let manager = ResourceManager::new(config);
    manager
        .register_agent(Agent::new(0, "one".to_string()))
        .unwrap();
    manager
        .register_agent(Agent::new(0, "two".to_string()))
        .unwrap();
    assert!(manager
        .register_agent(Agent::new(0, "three".to_string()))
        .is_err());
}

#[test]
fn test_deregister_agent_returns_everything() {
    let manager = ResourceManager::new(test_config());
    manager.start();
    manager.register_resource(api_resource(1, 10)).unwrap();
    let agent = manager
        .register_agent(Agent::new(0, "worker".to_string()).declare_max_need(1, 5))
        .unwrap();

    manager.request_resources(agent, 1, 3, None).unwrap();
    assert_eq!(manager.get_resource(1).unwrap().available(), 7);

    manager.deregister_agent(agent).unwrap();
    assert_eq!(manager.agent_count(), 0);
    assert_eq!(manager.get_resource(1).unwrap().available(), 10);
    assert!(manager.get_agent(agent).is_err());

    // The name is free again
    manager
        .register_agent(Agent::new(0, "worker".to_string()))
        .unwrap();
    manager.stop();
}

#[test]
fn test_update_agent_max_claim() {
    let manager = ResourceManager::new(test_config());
    manager.start();
    manager.register_resource(api_resource(1, 10)).unwrap();
    let agent = manager
        .register_agent(Agent::new(0, "worker".to_string()).declare_max_need(1, 5))
        .unwrap();

    manager.update_agent_max_claim(agent, 1, 8).unwrap();
    assert_eq!(manager.get_agent(agent).unwrap().max_need(1), 8);

    // Above capacity
    assert!(matches!(
        manager.update_agent_max_claim(agent, 1, 11).unwrap_err(),
        WardenError::ResourceCapacityExceeded { .. }
    ));

    // Below the current holding
    manager.request_resources(agent, 1, 4, None).unwrap();
    assert!(matches!(
        manager.update_agent_max_claim(agent, 1, 3).unwrap_err(),
        WardenError::MaxClaimExceeded { .. }
    ));
    manager.stop();
}

#[test]
fn test_update_resource_capacity() {
    let manager = ResourceManager::new(test_config());
    manager.start();
    manager.register_resource(api_resource(1, 10)).unwrap();
    let agent = manager
        .register_agent(Agent::new(0, "worker".to_string()).declare_max_need(1, 6))
        .unwrap();
    manager.request_resources(agent, 1, 6, None).unwrap();

    // Cannot shrink below the allocated sum
    assert!(manager.update_resource_capacity(1, 5).is_err());

    manager.update_resource_capacity(1, 8).unwrap();
    let resource = manager.get_resource(1).unwrap();
    assert_eq!(resource.total_capacity(), 8);
    assert_eq!(resource.available(), 2);
    manager.stop();
}

#[test]
fn test_is_safe_and_snapshot() {
    let manager = ResourceManager::new(test_config());
    manager.start();
    manager.register_resource(api_resource(1, 10)).unwrap();
    let agent = manager
        .register_agent(Agent::new(0, "worker".to_string()).declare_max_need(1, 5))
        .unwrap();
    manager.request_resources(agent, 1, 2, None).unwrap();

    assert!(manager.is_safe());

    let snapshot = manager.get_snapshot();
    assert!(snapshot.is_safe);
    assert_eq!(snapshot.total_resources[&1], 10);
    assert_eq!(snapshot.available_resources[&1], 8);
    assert_eq!(snapshot.agents.len(), 1);
    assert_eq!(snapshot.agents[0].allocations[&1], 2);
    assert_eq!(snapshot.agents[0].state, AgentState::Active);
    assert_eq!(snapshot.queue_depth(), 0);
    manager.stop();
}

#[test]
fn test_pending_request_count_starts_empty() {
    let manager = ResourceManager::new(test_config());
    manager.start();
    manager.register_resource(api_resource(1, 10)).unwrap();
    manager
        .register_agent(Agent::new(0, "worker".to_string()).declare_max_need(1, 5))
        .unwrap();
    assert_eq!(manager.pending_request_count(), 0);
    manager.stop();
}
