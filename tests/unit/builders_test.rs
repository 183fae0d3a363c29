//! Tests for builders

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

use prometheus_scheduler::builders::{build_engine, build_engine_with_hook, build_pool};
use prometheus_scheduler::config::{EngineConfig, ThreadPoolConfig, ThreadPriority};
use prometheus_scheduler::core::{PoolError, PriorityHook, ScheduleError, Task};

#[test]
fn test_build_pool() {
    let pool = build_pool(&ThreadPoolConfig::new().with_worker_count(2).with_name("built"))
        .expect("Failed to build pool");
    assert_eq!(pool.name(), "built");
    assert_eq!(pool.live_worker_count(), 2);
    pool.stop();
}

#[test]
fn test_build_engine_runs_tasks() {
    let mut cfg = EngineConfig::default();
    cfg.pool = cfg.pool.with_worker_count(2);

    let scheduler = build_engine(&cfg).expect("Failed to build engine");
    let count = Arc::new(AtomicU64::new(0));
    let c = Arc::clone(&count);
    let task = Task::new("built-engine", move || {
        c.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    scheduler
        .run_task_at(SystemTime::now(), task.into_shared())
        .expect("Failed to schedule");

    for _ in 0..200 {
        if count.load(Ordering::SeqCst) == 1 {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(count.load(Ordering::SeqCst), 1);
    scheduler.stop();
}

#[test]
fn test_build_engine_rejects_invalid_config() {
    let mut cfg = EngineConfig::default();
    cfg.scheduler.min_recurring_interval_ms = 0;
    let err = build_engine(&cfg).unwrap_err();
    assert!(matches!(err, ScheduleError::InvalidConfig(_)));
}

#[test]
fn test_build_engine_with_custom_priority_hook() {
    let mut cfg = EngineConfig::default();
    cfg.pool = cfg
        .pool
        .with_worker_count(2)
        .with_priority(ThreadPriority::BelowNormal);

    assert!(matches!(
        build_engine(&cfg),
        Err(ScheduleError::Pool(PoolError::NoLiveWorkers))
    ));

    let applied = Arc::new(AtomicU64::new(0));
    let a = Arc::clone(&applied);
    let hook: PriorityHook = Arc::new(move |priority| {
        assert_eq!(priority, ThreadPriority::BelowNormal);
        a.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    let scheduler = build_engine_with_hook(&cfg, hook).expect("Failed to build engine");
    assert_eq!(applied.load(Ordering::SeqCst), 2);
    assert_eq!(scheduler.pool().live_worker_count(), 2);
    scheduler.stop();
}
