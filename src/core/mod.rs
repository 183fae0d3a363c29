//! Core execution engine: tasks, history rings, thread pool and scheduler.

pub mod error;
pub mod history;
pub mod scheduler;
pub mod task;
pub mod thread_pool;

pub use error::{AppResult, ScheduleError, TaskError};
pub use history::HistoryRing;
pub use scheduler::{Scheduler, SchedulerStats};
pub use task::{Task, TaskDefinition, TaskFn, TaskSnapshot, TaskState};
pub use thread_pool::{default_priority_hook, PoolError, PoolStats, PriorityHook, ThreadPool};
