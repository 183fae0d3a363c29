//! Build a thread pool and its scheduler from [`EngineConfig`].

use std::sync::Arc;

use tracing::debug;

use crate::config::{EngineConfig, ThreadPoolConfig};
use crate::core::{default_priority_hook, PoolError, PriorityHook, ScheduleError, Scheduler, ThreadPool};

/// Build a shared thread pool from configuration.
///
/// # Errors
///
/// Propagates [`ThreadPool::new`] failures.
pub fn build_pool(cfg: &ThreadPoolConfig) -> Result<Arc<ThreadPool>, PoolError> {
    ThreadPool::new(cfg.clone()).map(Arc::new)
}

/// Build a scheduler and the pool it owns from engine configuration.
///
/// # Errors
///
/// Returns `ScheduleError::InvalidConfig` if either section is invalid, or the
/// underlying pool/scheduler construction error.
pub fn build_engine(cfg: &EngineConfig) -> Result<Scheduler, ScheduleError> {
    build_engine_with_hook(cfg, default_priority_hook())
}

/// Same as [`build_engine`] with a custom worker priority hook.
///
/// # Errors
///
/// See [`build_engine`].
pub fn build_engine_with_hook(cfg: &EngineConfig, hook: PriorityHook) -> Result<Scheduler, ScheduleError> {
    cfg.validate().map_err(ScheduleError::InvalidConfig)?;

    let pool = Arc::new(ThreadPool::with_priority_hook(cfg.pool.clone(), hook)?);
    debug!(pool = pool.name(), "Engine pool built");
    Scheduler::new(pool, cfg.scheduler.clone())
}
