//! Scheduler and engine configuration.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::pool::ThreadPoolConfig;

/// Prefix of environment variables read by [`EngineConfig::from_env`].
pub const ENV_PREFIX: &str = "PROMETHEUS_SCHEDULER_";

/// Configuration for a [`Scheduler`](crate::core::Scheduler).
///
/// Durations are stored as integer milliseconds (microseconds for the initial
/// backoff step) so the JSON form stays flat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Minimum allowed recurring interval in milliseconds.
    pub min_recurring_interval_ms: u64,
    /// Maximum number of scheduled entries.
    pub max_scheduled_entries: usize,
    /// How late a due entry may run before it is skipped, in milliseconds.
    pub max_delay_tolerance_ms: u64,
    /// First backoff step after the pool refuses work, in microseconds.
    pub backoff_initial_us: u64,
    /// Upper bound for the backoff step, in milliseconds.
    pub backoff_max_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_recurring_interval_ms: 100,
            max_scheduled_entries: 1_000_000,
            max_delay_tolerance_ms: 1_000,
            backoff_initial_us: 200,
            backoff_max_ms: 50,
        }
    }
}

impl SchedulerConfig {
    /// Create a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum recurring interval.
    #[must_use]
    pub fn with_min_recurring_interval(mut self, interval: Duration) -> Self {
        self.min_recurring_interval_ms = duration_to_ms(interval);
        self
    }

    /// Set the maximum scheduled-entry count.
    #[must_use]
    pub const fn with_max_scheduled_entries(mut self, max: usize) -> Self {
        self.max_scheduled_entries = max;
        self
    }

    /// Set the maximum delay tolerance.
    #[must_use]
    pub fn with_max_delay_tolerance(mut self, tolerance: Duration) -> Self {
        self.max_delay_tolerance_ms = duration_to_ms(tolerance);
        self
    }

    /// Set the backoff bounds used while the pool is saturated.
    #[must_use]
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.backoff_initial_us = u64::try_from(initial.as_micros()).unwrap_or(u64::MAX);
        self.backoff_max_ms = duration_to_ms(max);
        self
    }

    /// Minimum recurring interval.
    #[must_use]
    pub const fn min_recurring_interval(&self) -> Duration {
        Duration::from_millis(self.min_recurring_interval_ms)
    }

    /// Maximum delay tolerance.
    #[must_use]
    pub const fn max_delay_tolerance(&self) -> Duration {
        Duration::from_millis(self.max_delay_tolerance_ms)
    }

    /// First backoff step.
    #[must_use]
    pub const fn backoff_initial(&self) -> Duration {
        Duration::from_micros(self.backoff_initial_us)
    }

    /// Backoff ceiling.
    #[must_use]
    pub const fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    /// Validate scheduler configuration values.
    ///
    /// Recurring arithmetic works in whole milliseconds, so the minimum
    /// recurring interval must be at least 1 ms.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_recurring_interval_ms == 0 {
            return Err("min_recurring_interval_ms must be at least 1".into());
        }
        if self.max_scheduled_entries == 0 {
            return Err("max_scheduled_entries must be greater than 0".into());
        }
        if self.backoff_initial_us == 0 {
            return Err("backoff_initial_us must be greater than 0".into());
        }
        if self.backoff_initial() > self.backoff_max() {
            return Err("backoff_initial_us must not exceed backoff_max_ms".into());
        }
        Ok(())
    }
}

/// Root configuration: one pool plus the scheduler that feeds it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Backing thread pool.
    pub pool: ThreadPoolConfig,
    /// Scheduler settings.
    pub scheduler: SchedulerConfig,
}

impl EngineConfig {
    /// Validate both halves.
    ///
    /// # Errors
    ///
    /// Returns a description prefixed with the failing section.
    pub fn validate(&self) -> Result<(), String> {
        self.pool.validate().map_err(|e| format!("pool invalid: {e}"))?;
        self.scheduler
            .validate()
            .map_err(|e| format!("scheduler invalid: {e}"))
    }

    /// Parse engine configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from defaults overridden by `PROMETHEUS_SCHEDULER_*`
    /// environment variables. A `.env` file is loaded first when present.
    ///
    /// # Errors
    ///
    /// Returns a message naming the variable that failed to parse, or a
    /// validation message.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();

        if let Some(name) = env_var("POOL_NAME") {
            cfg.pool.name = name;
        }
        override_from_env(&mut cfg.pool.worker_count, "WORKER_COUNT")?;
        override_from_env(&mut cfg.pool.max_executed_history, "MAX_EXECUTED_HISTORY")?;
        override_from_env(&mut cfg.pool.max_exception_history, "MAX_EXCEPTION_HISTORY")?;
        override_from_env(&mut cfg.pool.max_pending_tasks, "MAX_PENDING_TASKS")?;
        override_from_env(&mut cfg.pool.thread_stack_size, "THREAD_STACK_SIZE")?;
        if let Some(raw) = env_var("THREAD_PRIORITY") {
            cfg.pool.priority = serde_json::from_value(serde_json::Value::String(raw.clone()))
                .map_err(|e| format!("{ENV_PREFIX}THREAD_PRIORITY=`{raw}`: {e}"))?;
        }

        let sched = &mut cfg.scheduler;
        override_from_env(&mut sched.min_recurring_interval_ms, "MIN_RECURRING_INTERVAL_MS")?;
        override_from_env(&mut sched.max_scheduled_entries, "MAX_SCHEDULED_ENTRIES")?;
        override_from_env(&mut sched.max_delay_tolerance_ms, "MAX_DELAY_TOLERANCE_MS")?;
        override_from_env(&mut sched.backoff_initial_us, "BACKOFF_INITIAL_US")?;
        override_from_env(&mut sched.backoff_max_ms, "BACKOFF_MAX_MS")?;

        cfg.validate()?;
        Ok(cfg)
    }
}

fn env_var(suffix: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}{suffix}")).ok()
}

fn override_from_env<T>(slot: &mut T, suffix: &str) -> Result<(), String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = env_var(suffix) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|e| format!("{ENV_PREFIX}{suffix}=`{raw}`: {e}"))?;
    }
    Ok(())
}

fn duration_to_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
