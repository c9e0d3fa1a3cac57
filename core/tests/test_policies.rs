//! Integration tests for scheduling policies driving the processor
//!
//! Each test parks several requests behind a fully-held resource, then
//! releases it and observes which waiter the active policy serves first.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use agent_warden_core_rs::{
    Agent, Config, FutureRequestStatus, PolicyConfig, RequestStatus, Resource, ResourceCategory,
    ResourceManager, PRIORITY_CRITICAL, PRIORITY_HIGH, PRIORITY_LOW,
};

fn contended_manager(policy: PolicyConfig) -> (ResourceManager, u64) {
    let manager = ResourceManager::new(Config {
        default_request_timeout: Some(Duration::from_secs(5)),
        processor_poll_interval: Duration::from_millis(5),
        ..Config::default()
    });
    manager.set_policy_config(policy);
    manager.start();
    manager
        .register_resource(Resource::new(
            1,
            "slots".to_string(),
            ResourceCategory::ToolSlot,
            2,
        ))
        .unwrap();
    let holder = manager
        .register_agent(Agent::new(0, "holder".to_string()).declare_max_need(1, 2))
        .unwrap();
    manager.request_resources(holder, 1, 2, None).unwrap();
    (manager, holder)
}

fn wait_granted(future: &FutureRequestStatus) -> bool {
    future.result() == RequestStatus::Granted
}

#[test]
fn test_priority_policy_serves_urgent_first() {
    let (manager, holder) = contended_manager(PolicyConfig::Priority);

    let lazy = manager
        .register_agent(
            Agent::new(0, "lazy".to_string())
                .with_priority(PRIORITY_LOW)
                .declare_max_need(1, 2),
        )
        .unwrap();
    let urgent = manager
        .register_agent(
            Agent::new(0, "urgent".to_string())
                .with_priority(PRIORITY_HIGH)
                .declare_max_need(1, 2),
        )
        .unwrap();

    // Low-priority waiter is submitted first
    let lazy_future = manager.request_resources_async(lazy, 1, 2, None).unwrap();
    let urgent_future = manager.request_resources_async(urgent, 1, 2, None).unwrap();
    assert_eq!(manager.pending_request_count(), 2);

    // Capacity for exactly one waiter
    manager.release_resources(holder, 1, 2).unwrap();
    assert!(wait_granted(&urgent_future));
    assert!(!lazy_future.ready());

    manager.stop();
    assert_eq!(lazy_future.result(), RequestStatus::Cancelled);
}

#[test]
fn test_shortest_need_policy_serves_small_claims_first() {
    let (manager, holder) = contended_manager(PolicyConfig::ShortestNeed);

    let big = manager
        .register_agent(Agent::new(0, "big".to_string()).declare_max_need(1, 2))
        .unwrap();
    let small = manager
        .register_agent(Agent::new(0, "small".to_string()).declare_max_need(1, 1))
        .unwrap();

    let big_future = manager.request_resources_async(big, 1, 2, None).unwrap();
    let small_future = manager.request_resources_async(small, 1, 1, None).unwrap();

    manager.release_resources(holder, 1, 1).unwrap();
    assert!(wait_granted(&small_future));
    assert!(!big_future.ready());

    manager.stop();
}

#[test]
fn test_deadline_policy_serves_tightest_deadline_first() {
    let (manager, holder) = contended_manager(PolicyConfig::Deadline);

    let relaxed = manager
        .register_agent(Agent::new(0, "relaxed".to_string()).declare_max_need(1, 2))
        .unwrap();
    let rushed = manager
        .register_agent(Agent::new(0, "rushed".to_string()).declare_max_need(1, 2))
        .unwrap();

    let relaxed_future = manager
        .request_resources_async(relaxed, 1, 2, Some(Duration::from_secs(60)))
        .unwrap();
    let rushed_future = manager
        .request_resources_async(rushed, 1, 2, Some(Duration::from_secs(5)))
        .unwrap();

    manager.release_resources(holder, 1, 2).unwrap();
    assert!(wait_granted(&rushed_future));
    assert!(!relaxed_future.ready());

    manager.stop();
}

#[test]
fn test_fairness_policy_serves_least_granted_agent_first() {
    let (manager, holder) = contended_manager(PolicyConfig::Fairness);

    let veteran = manager
        .register_agent(Agent::new(0, "veteran".to_string()).declare_max_need(1, 2))
        .unwrap();
    let newcomer = manager
        .register_agent(Agent::new(0, "newcomer".to_string()).declare_max_need(1, 2))
        .unwrap();

    // Give the veteran some granted history while units are free
    manager.release_resources(holder, 1, 2).unwrap();
    manager.request_resources(veteran, 1, 1, None).unwrap();
    manager.release_resources(veteran, 1, 1).unwrap();
    manager.request_resources(holder, 1, 2, None).unwrap();

    let veteran_future = manager.request_resources_async(veteran, 1, 2, None).unwrap();
    let newcomer_future = manager.request_resources_async(newcomer, 1, 2, None).unwrap();

    manager.release_resources(holder, 1, 2).unwrap();
    assert!(wait_granted(&newcomer_future));
    assert!(!veteran_future.ready());

    manager.stop();
}

#[test]
fn test_fifo_policy_preserves_submission_order() {
    let (manager, holder) = contended_manager(PolicyConfig::Fifo);

    let early = manager
        .register_agent(Agent::new(0, "early".to_string()).declare_max_need(1, 2))
        .unwrap();
    let late = manager
        .register_agent(
            Agent::new(0, "late".to_string())
                .with_priority(PRIORITY_HIGH)
                .declare_max_need(1, 2),
        )
        .unwrap();

    let early_future = manager.request_resources_async(early, 1, 2, None).unwrap();
    let late_future = manager.request_resources_async(late, 1, 2, None).unwrap();

    // FIFO ignores the late request's higher priority
    manager.release_resources(holder, 1, 2).unwrap();
    assert!(wait_granted(&early_future));
    assert!(!late_future.ready());

    manager.stop();
}

#[test]
fn test_priority_override_outranks_agent_priority() {
    let (manager, holder) = contended_manager(PolicyConfig::Priority);
    let manager = Arc::new(manager);

    let normal = manager
        .register_agent(Agent::new(0, "normal".to_string()).declare_max_need(1, 2))
        .unwrap();
    let boosted = manager
        .register_agent(
            Agent::new(0, "boosted".to_string())
                .with_priority(PRIORITY_LOW)
                .declare_max_need(1, 2),
        )
        .unwrap();

    let normal_future = manager.request_resources_async(normal, 1, 2, None).unwrap();

    // The low-priority agent submits with an explicit critical override
    let blocked = manager.clone();
    let handle = thread::spawn(move || {
        blocked.request_resources_with_priority(boosted, 1, 2, None, PRIORITY_CRITICAL)
    });
    let deadline = Instant::now() + Duration::from_secs(2);
    while manager.pending_request_count() < 2 {
        assert!(Instant::now() < deadline, "override request never queued");
        thread::sleep(Duration::from_millis(5));
    }

    manager.release_resources(holder, 1, 2).unwrap();
    assert_eq!(handle.join().unwrap().unwrap(), RequestStatus::Granted);
    assert!(!normal_future.ready());

    manager.stop();
}
