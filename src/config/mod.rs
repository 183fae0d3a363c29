//! Configuration models for the thread pool, scheduler and engine.

pub mod pool;
pub mod scheduler;

pub use pool::{ThreadPoolConfig, ThreadPriority};
pub use scheduler::{EngineConfig, SchedulerConfig, ENV_PREFIX};
