//! Wall-clock helpers shared by the pool and the scheduler.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Roughly one hundred years, the oldest start time a submission may carry.
pub const HUNDRED_YEARS: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Milliseconds since the Unix epoch for the current instant.
#[must_use]
pub fn now_ms() -> u128 {
    to_epoch_ms(SystemTime::now())
}

/// Milliseconds since the Unix epoch for `time`, clamped at zero.
#[must_use]
pub fn to_epoch_ms(time: SystemTime) -> u128 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Time elapsed from `earlier` to `later`, or zero if `earlier` is in the future.
#[must_use]
pub fn elapsed_between(earlier: SystemTime, later: SystemTime) -> Duration {
    later.duration_since(earlier).unwrap_or(Duration::ZERO)
}
