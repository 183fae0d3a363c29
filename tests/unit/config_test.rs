//! Tests for configuration validation

use std::time::Duration;

use prometheus_scheduler::config::{EngineConfig, SchedulerConfig, ThreadPoolConfig, ThreadPriority};

#[test]
fn test_pool_config_validation() {
    let valid = ThreadPoolConfig::new()
        .with_worker_count(4)
        .with_max_pending_tasks(100)
        .with_max_executed_history(50);
    assert!(valid.validate().is_ok());
}

#[test]
fn test_pool_config_invalid_pending() {
    let invalid = ThreadPoolConfig::new().with_max_pending_tasks(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_pool_config_invalid_name() {
    let invalid = ThreadPoolConfig::new().with_name("  ");
    assert!(invalid.validate().is_err());
}

#[test]
fn test_pool_config_tiny_stack_rejected() {
    let invalid = ThreadPoolConfig::new().with_thread_stack_size(1024);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_validation() {
    let valid = SchedulerConfig::new()
        .with_min_recurring_interval(Duration::from_millis(50))
        .with_max_delay_tolerance(Duration::from_secs(2))
        .with_max_scheduled_entries(10);
    assert!(valid.validate().is_ok());
    assert_eq!(valid.max_delay_tolerance(), Duration::from_secs(2));
}

#[test]
fn test_scheduler_config_zero_entries_rejected() {
    let invalid = SchedulerConfig::new().with_max_scheduled_entries(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_engine_config_from_json() {
    let json = r#"{
        "pool": {
            "name": "reports",
            "worker_count": 3,
            "max_pending_tasks": 64,
            "priority": "above_normal"
        },
        "scheduler": {
            "min_recurring_interval_ms": 250,
            "max_delay_tolerance_ms": 5000
        }
    }"#;

    let config = EngineConfig::from_json_str(json).expect("valid config");
    assert_eq!(config.pool.name, "reports");
    assert_eq!(config.pool.worker_count, 3);
    assert_eq!(config.pool.max_pending_tasks, 64);
    assert_eq!(config.pool.max_exception_history, 1_000);
    assert_eq!(config.pool.priority, ThreadPriority::AboveNormal);
    assert_eq!(config.scheduler.min_recurring_interval(), Duration::from_millis(250));
    assert_eq!(config.scheduler.max_scheduled_entries, 1_000_000);
}

#[test]
fn test_engine_config_from_json_invalid() {
    let json = r#"{ "pool": { "worker_count": 0 } }"#;
    let err = EngineConfig::from_json_str(json).unwrap_err();
    assert!(err.starts_with("pool invalid"), "{err}");

    assert!(EngineConfig::from_json_str("not json").is_err());
}

#[test]
fn test_engine_config_from_env() {
    // Only this test touches these variables
    std::env::set_var("PROMETHEUS_SCHEDULER_WORKER_COUNT", "7");
    std::env::set_var("PROMETHEUS_SCHEDULER_THREAD_PRIORITY", "lowest");
    std::env::set_var("PROMETHEUS_SCHEDULER_MAX_DELAY_TOLERANCE_MS", "2500");

    let config = EngineConfig::from_env().expect("valid env config");
    assert_eq!(config.pool.worker_count, 7);
    assert_eq!(config.pool.priority, ThreadPriority::Lowest);
    assert_eq!(config.scheduler.max_delay_tolerance(), Duration::from_millis(2_500));

    std::env::set_var("PROMETHEUS_SCHEDULER_WORKER_COUNT", "many");
    let err = EngineConfig::from_env().unwrap_err();
    assert!(err.contains("WORKER_COUNT"), "{err}");

    std::env::remove_var("PROMETHEUS_SCHEDULER_WORKER_COUNT");
    std::env::remove_var("PROMETHEUS_SCHEDULER_THREAD_PRIORITY");
    std::env::remove_var("PROMETHEUS_SCHEDULER_MAX_DELAY_TOLERANCE_MS");
}

#[test]
fn test_unbounded_history_config_builds_pool() {
    let cfg = ThreadPoolConfig::new()
        .with_worker_count(1)
        .with_max_executed_history(usize::MAX)
        .with_max_exception_history(usize::MAX);
    assert!(cfg.validate().is_ok());

    let pool = prometheus_scheduler::ThreadPool::new(cfg).expect("Failed to create pool");
    assert!(pool.executed_tasks().is_empty());
    pool.stop();
}
