//! Tests for utility functions

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use prometheus_scheduler::util::{
    elapsed_between, init_tracing, now_ms, to_epoch_ms, DEFAULT_LOG_DIRECTIVE, HUNDRED_YEARS,
};

#[test]
fn test_now_ms_is_after_2020() {
    // 2020-01-01T00:00:00Z
    assert!(now_ms() > 1_577_836_800_000);
}

#[test]
fn test_to_epoch_ms() {
    let t = UNIX_EPOCH + Duration::from_millis(1_234);
    assert_eq!(to_epoch_ms(t), 1_234);
}

#[test]
fn test_elapsed_between_future_is_zero() {
    let now = SystemTime::now();
    assert_eq!(elapsed_between(now + Duration::from_secs(1), now), Duration::ZERO);
}

#[test]
fn test_hundred_years_constant() {
    assert_eq!(HUNDRED_YEARS.as_secs(), 100 * 365 * 86_400);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
}

#[test]
fn test_default_log_directive_parses() {
    assert!(tracing_subscriber::EnvFilter::try_new(DEFAULT_LOG_DIRECTIVE).is_ok());
}
