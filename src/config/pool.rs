//! Thread pool configuration.

use serde::{Deserialize, Serialize};

/// Scheduling priority requested for worker threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadPriority {
    /// Lowest priority.
    Lowest,
    /// Below normal priority.
    BelowNormal,
    /// The platform default.
    #[default]
    Normal,
    /// Above normal priority.
    AboveNormal,
    /// Highest priority.
    Highest,
}

impl ThreadPriority {
    /// Snake-case label, matching the serde representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lowest => "lowest",
            Self::BelowNormal => "below_normal",
            Self::Normal => "normal",
            Self::AboveNormal => "above_normal",
            Self::Highest => "highest",
        }
    }
}

/// Configuration for a [`ThreadPool`](crate::core::ThreadPool).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadPoolConfig {
    /// Display name, also used as the worker thread name prefix.
    pub name: String,
    /// Number of worker threads.
    pub worker_count: usize,
    /// Capacity of the executed-task history ring.
    pub max_executed_history: usize,
    /// Capacity of the exception-task history ring.
    pub max_exception_history: usize,
    /// Maximum backlog (`enqueued - executed`) before enqueue is refused.
    pub max_pending_tasks: usize,
    /// Priority applied to every worker thread at startup.
    pub priority: ThreadPriority,
    /// Stack size for worker threads in bytes.
    pub thread_stack_size: usize,
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            name: "default-thread-pool".into(),
            worker_count: num_cpus::get(),
            max_executed_history: 10_000,
            max_exception_history: 1_000,
            max_pending_tasks: 1_000_000,
            priority: ThreadPriority::Normal,
            thread_stack_size: 2 * 1024 * 1024,
        }
    }
}

impl ThreadPoolConfig {
    /// Create a configuration with defaults (one worker per logical CPU).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pool display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the worker thread count.
    #[must_use]
    pub const fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    /// Set the executed-history capacity.
    #[must_use]
    pub const fn with_max_executed_history(mut self, max: usize) -> Self {
        self.max_executed_history = max;
        self
    }

    /// Set the exception-history capacity.
    #[must_use]
    pub const fn with_max_exception_history(mut self, max: usize) -> Self {
        self.max_exception_history = max;
        self
    }

    /// Set the maximum pending backlog.
    #[must_use]
    pub const fn with_max_pending_tasks(mut self, max: usize) -> Self {
        self.max_pending_tasks = max;
        self
    }

    /// Set the worker thread priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: ThreadPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the worker thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, size: usize) -> Self {
        self.thread_stack_size = size;
        self
    }

    /// Validate pool configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.max_pending_tasks == 0 {
            return Err("max_pending_tasks must be greater than 0".into());
        }
        if self.thread_stack_size < 16 * 1024 {
            return Err("thread_stack_size must be at least 16 KiB".into());
        }
        if self.name.trim().is_empty() {
            return Err("name must not be empty".into());
        }
        Ok(())
    }
}
