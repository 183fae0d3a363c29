//! Fixed-size thread pool over a bounded FIFO of tasks.
//!
//! `N` worker threads share one queue guarded by a `parking_lot::Mutex` and a
//! `Condvar`. Outcomes are filed into two bounded history rings behind a
//! separate `RwLock`, so reporting never contends with the enqueue/dequeue
//! path.
//!
//! # Design Principles
//!
//! - **No polling**: idle workers block on the condvar until work or stop arrives
//! - **Fail-fast admission**: `enqueue` refuses work once the backlog
//!   (`enqueued - executed`) reaches `max_pending_tasks`
//! - **Non-draining shutdown**: `stop` lets running tasks finish, abandons the rest

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender};
use parking_lot::{Condvar, Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::{ThreadPoolConfig, ThreadPriority};

use super::error::TaskError;
use super::history::HistoryRing;
use super::task::Task;

/// Applies a [`ThreadPriority`] to the calling worker thread.
///
/// An `Err` aborts that worker; the pool keeps running on the others.
pub type PriorityHook = Arc<dyn Fn(ThreadPriority) -> Result<(), String> + Send + Sync>;

/// Hook used by [`ThreadPool::new`]. Only `Normal` can be honoured without a
/// platform-specific hook.
#[must_use]
pub fn default_priority_hook() -> PriorityHook {
    Arc::new(|priority| match priority {
        ThreadPriority::Normal => Ok(()),
        other => Err(format!(
            "thread priority `{}` requires a platform priority hook",
            other.as_str()
        )),
    })
}

/// Errors that can occur when using a `ThreadPool`.
#[derive(Debug)]
pub enum PoolError {
    /// The pending backlog is at capacity; the task was not queued.
    QueueFull {
        /// Backlog observed at admission time.
        pending: u64,
        /// Configured maximum backlog.
        max_pending: usize,
    },

    /// The pool has been shut down.
    Shutdown,

    /// Configuration validation failed.
    InvalidConfig(String),

    /// A worker thread could not be spawned.
    Spawn(String),

    /// Every worker failed its startup setup.
    NoLiveWorkers,
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull { pending, max_pending } => {
                write!(f, "task queue is full: {pending} pending, max {max_pending}")
            }
            Self::Shutdown => write!(f, "pool has been shut down"),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            Self::Spawn(msg) => write!(f, "failed to spawn worker thread: {msg}"),
            Self::NoLiveWorkers => write!(f, "no worker thread survived startup"),
        }
    }
}

impl std::error::Error for PoolError {}

/// Statistics about pool utilization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Pool display name.
    pub name: String,

    /// Configured number of workers.
    pub pool_size: usize,

    /// Workers currently running their loop.
    pub live_workers: usize,

    /// Total tasks accepted by `enqueue`.
    pub enqueued_tasks: u64,

    /// Total tasks dequeued and run, whatever the outcome.
    pub executed_tasks: u64,

    /// `enqueued_tasks - executed_tasks`.
    pub pending_tasks: u64,

    /// Total runs that returned an error.
    pub failed_tasks: u64,

    /// Entries currently held in the executed-history ring.
    pub executed_history_len: usize,

    /// Entries currently held in the exception-history ring.
    pub exception_history_len: usize,
}

#[derive(Debug, Default)]
struct PoolCounters {
    enqueued: AtomicU64,
    executed: AtomicU64,
    failed: AtomicU64,
}

impl PoolCounters {
    fn pending(&self) -> u64 {
        // executed first: it can only catch up with enqueued, never pass it
        let executed = self.executed.load(Ordering::Acquire);
        let enqueued = self.enqueued.load(Ordering::Acquire);
        enqueued.saturating_sub(executed)
    }
}

struct TaskHistory {
    executed: HistoryRing<Arc<Task>>,
    exceptions: HistoryRing<Arc<Task>>,
}

/// State shared between the pool handle and its workers.
struct PoolShared {
    queue: Mutex<VecDeque<Arc<Task>>>,
    available: Condvar,
    stop: AtomicBool,
    history: RwLock<TaskHistory>,
    counters: PoolCounters,
    live_workers: AtomicUsize,
}

impl PoolShared {
    fn record(&self, worker_id: usize, task: Arc<Task>, outcome: Result<(), TaskError>) {
        let mut history = self.history.write();
        if let Err(err) = outcome {
            warn!(
                worker_id = worker_id,
                task = task.name(),
                guid = task.guid(),
                error = %err,
                "Task failed"
            );
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
            history.exceptions.push(Arc::clone(&task));
        }
        history.executed.push(task);
        drop(history);
        self.counters.executed.fetch_add(1, Ordering::AcqRel);
    }

    fn signal_stop(&self) -> bool {
        if self.stop.swap(true, Ordering::AcqRel) {
            return false;
        }
        // notify under the queue lock so no worker misses the flag between check and wait
        let _queue = self.queue.lock();
        self.available.notify_all();
        true
    }
}

enum WorkerStartup {
    Ready,
    Failed { worker_id: usize, reason: String },
}

/// Bounded pool of worker threads executing [`Task`]s in FIFO order.
///
/// Construction blocks until every worker has either entered its loop or
/// failed setup, so tasks enqueued right after `new` returns are serviced.
pub struct ThreadPool {
    /// Pool configuration.
    config: ThreadPoolConfig,

    /// Queue, history and counters shared with the workers.
    shared: Arc<PoolShared>,

    /// Worker thread handles, drained by `stop`.
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadPool {
    /// Create a pool using [`default_priority_hook`].
    ///
    /// # Errors
    ///
    /// See [`ThreadPool::with_priority_hook`].
    pub fn new(config: ThreadPoolConfig) -> Result<Self, PoolError> {
        Self::with_priority_hook(config, default_priority_hook())
    }

    /// Create a pool whose workers apply `config.priority` through `hook`.
    ///
    /// # Errors
    ///
    /// - `PoolError::InvalidConfig` if the configuration is invalid
    /// - `PoolError::Spawn` if the OS refused to create a thread
    /// - `PoolError::NoLiveWorkers` if every worker failed priority setup
    pub fn with_priority_hook(config: ThreadPoolConfig, hook: PriorityHook) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;

        let shared = Arc::new(PoolShared {
            queue: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            stop: AtomicBool::new(false),
            history: RwLock::new(TaskHistory {
                executed: HistoryRing::new(config.max_executed_history),
                exceptions: HistoryRing::new(config.max_exception_history),
            }),
            counters: PoolCounters::default(),
            live_workers: AtomicUsize::new(0),
        });

        let (ready_tx, ready_rx) = bounded::<WorkerStartup>(config.worker_count);
        let mut workers = Vec::with_capacity(config.worker_count);

        for worker_id in 0..config.worker_count {
            match spawn_worker(worker_id, &config, Arc::clone(&shared), Arc::clone(&hook), ready_tx.clone()) {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    error!(pool = %config.name, worker_id = worker_id, error = %e, "Failed to spawn worker thread");
                    join_all(&shared, workers);
                    return Err(PoolError::Spawn(e.to_string()));
                }
            }
        }
        drop(ready_tx);

        // Block until every worker has reported in
        let mut ready = 0usize;
        while let Ok(startup) = ready_rx.recv() {
            match startup {
                WorkerStartup::Ready => ready += 1,
                WorkerStartup::Failed { worker_id, reason } => {
                    warn!(pool = %config.name, worker_id = worker_id, reason = %reason, "Worker aborted during setup");
                }
            }
        }

        if ready == 0 {
            join_all(&shared, workers);
            return Err(PoolError::NoLiveWorkers);
        }

        info!(
            pool = %config.name,
            worker_count = config.worker_count,
            live_workers = ready,
            max_pending_tasks = config.max_pending_tasks,
            max_executed_history = config.max_executed_history,
            "ThreadPool initialized"
        );

        Ok(Self {
            config,
            shared,
            workers: Mutex::new(workers),
        })
    }

    /// Queue a task for execution.
    ///
    /// Never blocks on a full queue; the caller decides whether to retry.
    ///
    /// # Errors
    ///
    /// - `PoolError::QueueFull` if the backlog is at `max_pending_tasks`
    /// - `PoolError::Shutdown` if the pool has been stopped
    pub fn enqueue(&self, task: Arc<Task>) -> Result<(), PoolError> {
        {
            let mut queue = self.shared.queue.lock();
            if self.shared.stop.load(Ordering::Acquire) {
                return Err(PoolError::Shutdown);
            }

            let pending = self.shared.counters.pending();
            if pending >= self.config.max_pending_tasks as u64 {
                debug!(pool = %self.config.name, pending = pending, "Thread pool backlog is full");
                return Err(PoolError::QueueFull {
                    pending,
                    max_pending: self.config.max_pending_tasks,
                });
            }

            debug!(pool = %self.config.name, task = task.name(), "Task enqueued");
            queue.push_back(task);
            self.shared.counters.enqueued.fetch_add(1, Ordering::AcqRel);
        }
        self.shared.available.notify_one();
        Ok(())
    }

    /// Pool display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Configured number of worker threads.
    #[must_use]
    pub const fn pool_size(&self) -> usize {
        self.config.worker_count
    }

    /// Workers currently running their loop.
    #[must_use]
    pub fn live_worker_count(&self) -> usize {
        self.shared.live_workers.load(Ordering::Acquire)
    }

    /// Pool configuration.
    #[must_use]
    pub const fn config(&self) -> &ThreadPoolConfig {
        &self.config
    }

    /// Total tasks accepted.
    #[must_use]
    pub fn enqueued_task_count(&self) -> u64 {
        self.shared.counters.enqueued.load(Ordering::Acquire)
    }

    /// Total tasks run to an outcome.
    #[must_use]
    pub fn executed_task_count(&self) -> u64 {
        self.shared.counters.executed.load(Ordering::Acquire)
    }

    /// Tasks queued or running.
    #[must_use]
    pub fn pending_task_count(&self) -> u64 {
        self.shared.counters.pending()
    }

    /// Total runs that returned an error.
    #[must_use]
    pub fn failed_task_count(&self) -> u64 {
        self.shared.counters.failed.load(Ordering::Relaxed)
    }

    /// Snapshot of the executed-history ring, oldest first.
    #[must_use]
    pub fn executed_tasks(&self) -> Vec<Arc<Task>> {
        self.shared.history.read().executed.snapshot()
    }

    /// Snapshot of the exception-history ring, oldest first.
    #[must_use]
    pub fn exception_tasks(&self) -> Vec<Arc<Task>> {
        self.shared.history.read().exceptions.snapshot()
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let (executed_history_len, exception_history_len) = {
            let history = self.shared.history.read();
            (history.executed.len(), history.exceptions.len())
        };
        PoolStats {
            name: self.config.name.clone(),
            pool_size: self.config.worker_count,
            live_workers: self.live_worker_count(),
            enqueued_tasks: self.enqueued_task_count(),
            executed_tasks: self.executed_task_count(),
            pending_tasks: self.pending_task_count(),
            failed_tasks: self.failed_task_count(),
            executed_history_len,
            exception_history_len,
        }
    }

    /// Whether `stop` has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shared.stop.load(Ordering::Acquire)
    }

    /// Stop the pool and join every worker.
    ///
    /// Running tasks finish; queued tasks are abandoned. Calling this again is
    /// a no-op.
    pub fn stop(&self) {
        if self.is_stopped() && self.workers.lock().is_empty() {
            return;
        }

        info!(pool = %self.config.name, "Stopping thread pool");
        let workers = std::mem::take(&mut *self.workers.lock());
        let worker_count = workers.len();
        join_all(&self.shared, workers);

        let abandoned = self.shared.queue.lock().len();
        info!(
            pool = %self.config.name,
            worker_count = worker_count,
            abandoned = abandoned,
            "Thread pool stopped"
        );
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        // Signal only; joining here could hang on a long-running task
        if self.shared.signal_stop() {
            debug!(pool = %self.config.name, "ThreadPool dropped without explicit stop - workers detached");
        }
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("name", &self.config.name)
            .field("pool_size", &self.config.worker_count)
            .field("pending", &self.pending_task_count())
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

fn join_all(shared: &PoolShared, workers: Vec<JoinHandle<()>>) {
    shared.signal_stop();
    for (idx, worker) in workers.into_iter().enumerate() {
        if worker.join().is_ok() {
            debug!(worker_id = idx, "Worker joined successfully");
        } else {
            warn!(worker_id = idx, "Worker panicked");
        }
    }
}

/// Spawn a worker thread.
fn spawn_worker(
    worker_id: usize,
    config: &ThreadPoolConfig,
    shared: Arc<PoolShared>,
    hook: PriorityHook,
    ready: Sender<WorkerStartup>,
) -> std::io::Result<JoinHandle<()>> {
    let priority = config.priority;
    thread::Builder::new()
        .name(format!("{}-worker-{worker_id}", config.name))
        .stack_size(config.thread_stack_size)
        .spawn(move || {
            if priority != ThreadPriority::Normal {
                if let Err(reason) = hook(priority) {
                    error!(
                        worker_id = worker_id,
                        priority = priority.as_str(),
                        error = %reason,
                        "Failed to apply worker thread priority"
                    );
                    let _ = ready.send(WorkerStartup::Failed { worker_id, reason });
                    return;
                }
            }

            shared.live_workers.fetch_add(1, Ordering::AcqRel);
            let _ = ready.send(WorkerStartup::Ready);
            drop(ready);
            debug!(worker_id = worker_id, "Worker thread started");

            worker_loop(worker_id, &shared);

            shared.live_workers.fetch_sub(1, Ordering::AcqRel);
            debug!(worker_id = worker_id, "Worker thread exiting");
        })
}

/// Block for work, run it, file the outcome. Exits as soon as stop is seen,
/// even if tasks are still queued.
fn worker_loop(worker_id: usize, shared: &PoolShared) {
    loop {
        let task = {
            let mut queue = shared.queue.lock();
            while queue.is_empty() && !shared.stop.load(Ordering::Acquire) {
                shared.available.wait(&mut queue);
            }
            if shared.stop.load(Ordering::Acquire) {
                break;
            }
            match queue.pop_front() {
                Some(task) => task,
                None => continue,
            }
        };

        debug!(worker_id = worker_id, task = task.name(), "Worker executing task");
        let outcome = task.run();
        shared.record(worker_id, task, outcome);
    }
}
