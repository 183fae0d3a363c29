//! # Prometheus Scheduler
//!
//! An in-process job scheduling and execution engine.
//!
//! The crate is made of two layers:
//!
//! - **`ThreadPool`**: a fixed set of OS worker threads consuming a bounded FIFO
//!   of [`core::Task`]s. Admission fails fast once the backlog reaches its cap,
//!   and every outcome is recorded in bounded history rings.
//! - **`Scheduler`**: a single dispatch thread over a min-heap of start times
//!   that feeds the pool with one-shot and recurring tasks, re-arms recurring
//!   work with drift correction, skips occurrences that arrive too late and
//!   backs off while the pool is saturated.
//!
//! ## Key Features
//!
//! - **Explicit outcomes**: a task run returns `Result<(), TaskError>`, keeping
//!   "action failed" apart from "completed, but the callback failed"
//! - **Fresh occurrences**: each recurring occurrence is a new `NotStarted`
//!   record sharing one immutable `TaskDefinition`
//! - **Backpressure, not blocking**: a full pool refuses work; the scheduler
//!   retries with bounded exponential backoff
//! - **Coarse shutdown**: `stop()` joins all threads; running tasks finish,
//!   queued ones are abandoned
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::{Duration, SystemTime};
//!
//! use prometheus_scheduler::config::{SchedulerConfig, ThreadPoolConfig};
//! use prometheus_scheduler::core::{Scheduler, Task, ThreadPool};
//!
//! let pool = Arc::new(ThreadPool::new(
//!     ThreadPoolConfig::new()
//!         .with_name("jobs")
//!         .with_worker_count(4)
//!         .with_max_pending_tasks(1_000),
//! )?);
//! let scheduler = Scheduler::new(pool, SchedulerConfig::new())?;
//!
//! let heartbeat = Task::new("heartbeat", || {
//!     println!("tick");
//!     Ok(())
//! });
//! scheduler.run_recurring_task_at(SystemTime::now(), Duration::from_secs(1), heartbeat.into_shared())?;
//!
//! // ...
//! scheduler.stop();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Tasks, history rings, the thread pool and the scheduler.
pub mod core;
/// Configuration models for the pool, scheduler and engine.
pub mod config;
/// Builders to construct engine components from configuration.
pub mod builders;
/// Shared utilities.
pub mod util;

pub use crate::core::{Scheduler, Task, ThreadPool};
