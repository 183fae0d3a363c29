//! Error types for task execution and scheduler submissions.

use std::time::Duration;

use thiserror::Error;

use super::PoolError;

/// Failure produced by a single task run.
///
/// The variant records which half of the task failed. A `Callback` failure
/// means the primary action already completed, so the task stays `Complete`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The primary action returned an error or panicked.
    #[error("error in primary action: {0}")]
    Action(String),
    /// The post-completion callback returned an error or panicked.
    #[error("error in post-completion callback: {0}")]
    Callback(String),
}

impl TaskError {
    /// Whether the failure happened after the action had completed.
    #[must_use]
    pub const fn is_callback_failure(&self) -> bool {
        matches!(self, Self::Callback(_))
    }
}

/// Errors produced by scheduler construction and submissions.
///
/// Every rejected submission leaves the scheduler untouched.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// A one-shot start time is older than the configured delay tolerance.
    #[error("start time is stale by {lateness:?} (tolerance {tolerance:?})")]
    StaleStartTime {
        /// How far in the past the requested start time is.
        lateness: Duration,
        /// Configured maximum delay tolerance.
        tolerance: Duration,
    },
    /// A recurring interval is shorter than the configured minimum.
    #[error("recurring interval {interval:?} is below minimum {minimum:?}")]
    IntervalTooShort {
        /// Requested interval.
        interval: Duration,
        /// Configured minimum recurring interval.
        minimum: Duration,
    },
    /// Re-arming a recurring entry after this interval would overflow the
    /// system clock.
    #[error("recurring interval {interval:?} is too long to re-arm")]
    IntervalTooLong {
        /// Requested interval.
        interval: Duration,
    },
    /// The start time is implausibly far in the past.
    #[error("start time is more than 100 years in the past")]
    StartTooFarInPast,
    /// The scheduled-entry structure is full.
    #[error("scheduled entry capacity exceeded (max {max})")]
    CapacityExceeded {
        /// Configured maximum entry count.
        max: usize,
    },
    /// The scheduler has been stopped.
    #[error("scheduler has been stopped")]
    Shutdown,
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The dispatch thread could not be spawned.
    #[error("failed to spawn dispatch thread: {0}")]
    Spawn(String),
    /// The backing pool could not be constructed.
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Application-facing result used by task actions and callbacks.
pub type AppResult<T> = Result<T, anyhow::Error>;
