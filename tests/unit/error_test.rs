//! Tests for error types

use std::time::Duration;

use prometheus_scheduler::core::{PoolError, ScheduleError, TaskError};

#[test]
fn test_queue_full_error() {
    let err = PoolError::QueueFull { pending: 5, max_pending: 5 };
    assert_eq!(format!("{}", err), "task queue is full: 5 pending, max 5");
}

#[test]
fn test_interval_too_short_error() {
    let err = ScheduleError::IntervalTooShort {
        interval: Duration::from_millis(10),
        minimum: Duration::from_millis(100),
    };
    assert_eq!(format!("{}", err), "recurring interval 10ms is below minimum 100ms");
}

#[test]
fn test_capacity_exceeded_error() {
    let err = ScheduleError::CapacityExceeded { max: 3 };
    assert_eq!(format!("{}", err), "scheduled entry capacity exceeded (max 3)");
}

#[test]
fn test_stale_start_error() {
    let err = ScheduleError::StaleStartTime {
        lateness: Duration::from_secs(2),
        tolerance: Duration::from_secs(1),
    };
    assert_eq!(format!("{}", err), "start time is stale by 2s (tolerance 1s)");
}

#[test]
fn test_pool_error_converts_into_schedule_error() {
    let err = ScheduleError::from(PoolError::InvalidConfig("worker_count must be greater than 0".into()));
    assert!(matches!(err, ScheduleError::Pool(PoolError::InvalidConfig(_))));
    assert_eq!(
        format!("{}", err),
        "invalid configuration: worker_count must be greater than 0"
    );
}

#[test]
fn test_task_error_context() {
    assert_eq!(
        format!("{}", TaskError::Callback("timeout".into())),
        "error in post-completion callback: timeout"
    );
}

#[test]
fn test_interval_too_long_error() {
    let err = ScheduleError::IntervalTooLong { interval: Duration::from_secs(5) };
    assert_eq!(format!("{}", err), "recurring interval 5s is too long to re-arm");
}
