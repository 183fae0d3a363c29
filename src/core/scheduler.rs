//! Time-triggered admission of tasks into a [`ThreadPool`].
//!
//! Entries live in a min-heap keyed by start time (ties broken by submission
//! order). One dispatch thread pops due entries, hands them to the pool and
//! re-arms recurring ones with drift correction. When the pool refuses work the
//! head entry stays put and the dispatcher backs off exponentially, so entries
//! due later wait behind it.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use crossbeam_channel::bounded;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::util::clock::{elapsed_between, to_epoch_ms, HUNDRED_YEARS};

use super::error::ScheduleError;
use super::task::Task;
use super::thread_pool::{PoolError, ThreadPool};

/// A task bound to its next start time and recurrence interval.
struct ScheduledEntry {
    start_at: SystemTime,
    /// Zero for one-shot entries.
    interval: Duration,
    /// Submission order, breaks ties between equal start times.
    seq: u64,
    task: Arc<Task>,
}

impl PartialEq for ScheduledEntry {
    fn eq(&self, other: &Self) -> bool {
        self.start_at == other.start_at && self.seq == other.seq
    }
}

impl Eq for ScheduledEntry {}

impl PartialOrd for ScheduledEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

// Reversed so the std max-heap yields the earliest start time first
impl Ord for ScheduledEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .start_at
            .cmp(&self.start_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Next start time for a recurring entry that became due `elapsed` ago.
///
/// Works in whole milliseconds: `remainder = elapsed mod interval`. The next
/// occurrence is `now + remainder`, unless that would be closer than
/// `min_interval`, in which case a full interval is added on top. Returns
/// `None` when the result is not representable as a `SystemTime`.
pub(crate) fn next_start_time(
    now: SystemTime,
    elapsed: Duration,
    interval: Duration,
    min_interval: Duration,
) -> Option<SystemTime> {
    let interval_ms = interval.as_millis().max(1);
    let remainder_ms = u64::try_from(elapsed.as_millis() % interval_ms).unwrap_or(u64::MAX);
    let remainder = Duration::from_millis(remainder_ms);
    if remainder < min_interval {
        now.checked_add(interval)?.checked_add(remainder)
    } else {
        now.checked_add(remainder)
    }
}

/// Bounded exponential backoff used while the pool is saturated.
#[derive(Debug, Clone)]
struct Backoff {
    initial: Duration,
    max: Duration,
    current: Option<Duration>,
}

impl Backoff {
    const fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: None,
        }
    }

    /// Whether a refusal streak is in progress.
    const fn is_backing_off(&self) -> bool {
        self.current.is_some()
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self
            .current
            .map_or(self.initial, |d| d.saturating_mul(2))
            .min(self.max);
        self.current = Some(delay);
        delay
    }

    fn reset(&mut self) {
        self.current = None;
    }
}

/// Scheduler statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Entries currently waiting in the heap.
    pub scheduled_entries: usize,
    /// Total submissions accepted.
    pub accepted: u64,
    /// Occurrences handed to the pool.
    pub dispatched: u64,
    /// Recurring occurrences skipped for being too late.
    pub skipped: u64,
    /// Times the dispatcher backed off on a full pool.
    pub backpressure_retries: u64,
    /// Entries dropped because the pool had shut down.
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct SchedulerCounters {
    accepted: AtomicU64,
    dispatched: AtomicU64,
    skipped: AtomicU64,
    backpressure_retries: AtomicU64,
    dropped: AtomicU64,
}

struct SchedulerShared {
    config: SchedulerConfig,
    pool: Arc<ThreadPool>,
    entries: Mutex<BinaryHeap<ScheduledEntry>>,
    wake: Condvar,
    stop: AtomicBool,
    next_seq: AtomicU64,
    counters: SchedulerCounters,
}

impl SchedulerShared {
    fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    fn signal_stop(&self) -> bool {
        if self.stop.swap(true, Ordering::AcqRel) {
            return false;
        }
        let _entries = self.entries.lock();
        self.wake.notify_all();
        true
    }
}

/// Dispatches one-shot and recurring tasks into a [`ThreadPool`] at their
/// start time.
pub struct Scheduler {
    shared: Arc<SchedulerShared>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Start a scheduler feeding `pool`. Blocks until the dispatch thread is
    /// running.
    ///
    /// # Errors
    ///
    /// - `ScheduleError::InvalidConfig` if the configuration is invalid
    /// - `ScheduleError::Spawn` if the dispatch thread could not be created
    pub fn new(pool: Arc<ThreadPool>, config: SchedulerConfig) -> Result<Self, ScheduleError> {
        config.validate().map_err(ScheduleError::InvalidConfig)?;

        let shared = Arc::new(SchedulerShared {
            config,
            pool,
            entries: Mutex::new(BinaryHeap::new()),
            wake: Condvar::new(),
            stop: AtomicBool::new(false),
            next_seq: AtomicU64::new(0),
            counters: SchedulerCounters::default(),
        });

        let (ready_tx, ready_rx) = bounded::<()>(1);
        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(format!("{}-dispatch", shared.pool.name()))
            .spawn(move || {
                let _ = ready_tx.send(());
                drop(ready_tx);
                debug!("Dispatch thread started");
                dispatch_loop(&thread_shared);
                debug!("Dispatch thread exiting");
            })
            .map_err(|e| ScheduleError::Spawn(e.to_string()))?;

        if ready_rx.recv().is_err() {
            return Err(ScheduleError::Spawn("dispatch thread exited during startup".into()));
        }

        info!(
            pool = shared.pool.name(),
            min_recurring_interval_ms = shared.config.min_recurring_interval_ms,
            max_delay_tolerance_ms = shared.config.max_delay_tolerance_ms,
            max_scheduled_entries = shared.config.max_scheduled_entries,
            "Scheduler initialized"
        );

        Ok(Self {
            shared,
            dispatcher: Mutex::new(Some(handle)),
        })
    }

    /// Run `task` once at `start_at`.
    ///
    /// # Errors
    ///
    /// - `ScheduleError::StaleStartTime` if `start_at` is older than the
    ///   delay tolerance
    /// - anything [`Scheduler::run_recurring_task_at`] returns
    pub fn run_task_at(&self, start_at: SystemTime, task: Arc<Task>) -> Result<(), ScheduleError> {
        let lateness = elapsed_between(start_at, SystemTime::now());
        let tolerance = self.shared.config.max_delay_tolerance();
        if lateness > tolerance {
            warn!(task = task.name(), lateness_ms = lateness.as_millis(), "Rejected stale one-shot task");
            return Err(ScheduleError::StaleStartTime { lateness, tolerance });
        }
        self.run_recurring_task_at(start_at, Duration::ZERO, task)
    }

    /// Run `task` at `start_at` and then every `interval`. A zero interval
    /// means one-shot.
    ///
    /// # Errors
    ///
    /// - `ScheduleError::IntervalTooShort` for a non-zero interval below the
    ///   configured minimum
    /// - `ScheduleError::IntervalTooLong` when re-arming after `interval`
    ///   would overflow the system clock
    /// - `ScheduleError::StartTooFarInPast` for start times over 100 years old
    /// - `ScheduleError::CapacityExceeded` when the entry heap is full
    /// - `ScheduleError::Shutdown` after `stop`
    pub fn run_recurring_task_at(
        &self,
        start_at: SystemTime,
        interval: Duration,
        task: Arc<Task>,
    ) -> Result<(), ScheduleError> {
        if self.is_stopped() {
            return Err(ScheduleError::Shutdown);
        }

        let minimum = self.shared.config.min_recurring_interval();
        if !interval.is_zero() && interval < minimum {
            warn!(task = task.name(), interval_ms = interval.as_millis(), "Rejected recurring interval below minimum");
            return Err(ScheduleError::IntervalTooShort { interval, minimum });
        }
        // Re-arm adds up to two intervals to the dispatch time
        let rearm_fits = SystemTime::now()
            .checked_add(interval)
            .and_then(|t| t.checked_add(interval))
            .is_some();
        if !rearm_fits {
            warn!(task = task.name(), interval = ?interval, "Rejected recurring interval that overflows the clock");
            return Err(ScheduleError::IntervalTooLong { interval });
        }

        if elapsed_between(start_at, SystemTime::now()) > HUNDRED_YEARS {
            warn!(task = task.name(), "Rejected start time more than 100 years in the past");
            return Err(ScheduleError::StartTooFarInPast);
        }

        {
            let mut entries = self.shared.entries.lock();
            if self.is_stopped() {
                return Err(ScheduleError::Shutdown);
            }
            let max = self.shared.config.max_scheduled_entries;
            if entries.len() >= max {
                warn!(task = task.name(), max = max, "Scheduled entry capacity exceeded");
                return Err(ScheduleError::CapacityExceeded { max });
            }

            debug!(
                task = task.name(),
                start_at_ms = to_epoch_ms(start_at),
                interval_ms = interval.as_millis(),
                "Task scheduled"
            );
            entries.push(ScheduledEntry {
                start_at,
                interval,
                seq: self.shared.next_seq(),
                task,
            });
        }
        self.shared.counters.accepted.fetch_add(1, Ordering::Relaxed);
        self.shared.wake.notify_one();
        Ok(())
    }

    /// Entries waiting for their start time.
    #[must_use]
    pub fn scheduled_entry_count(&self) -> usize {
        self.shared.entries.lock().len()
    }

    /// Scheduler statistics.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        let c = &self.shared.counters;
        SchedulerStats {
            scheduled_entries: self.scheduled_entry_count(),
            accepted: c.accepted.load(Ordering::Relaxed),
            dispatched: c.dispatched.load(Ordering::Relaxed),
            skipped: c.skipped.load(Ordering::Relaxed),
            backpressure_retries: c.backpressure_retries.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
        }
    }

    /// The backing pool.
    #[must_use]
    pub fn pool(&self) -> &Arc<ThreadPool> {
        &self.shared.pool
    }

    /// Scheduler configuration.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// Whether `stop` has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shared.stop.load(Ordering::Acquire)
    }

    /// Stop dispatching, join the dispatch thread, then stop the pool.
    /// Calling this again is a no-op.
    pub fn stop(&self) {
        if self.shared.signal_stop() {
            info!(pool = self.shared.pool.name(), "Stopping scheduler");
        }
        if let Some(handle) = self.dispatcher.lock().take() {
            if handle.join().is_err() {
                warn!("Dispatch thread panicked");
            }
        }
        self.shared.pool.stop();
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if self.shared.signal_stop() {
            debug!("Scheduler dropped without explicit stop - dispatch thread detached");
        }
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pool", &self.shared.pool.name())
            .field("scheduled_entries", &self.scheduled_entry_count())
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

fn dispatch_loop(shared: &SchedulerShared) {
    let min_interval = shared.config.min_recurring_interval();
    let tolerance = shared.config.max_delay_tolerance();
    let counters = &shared.counters;
    let mut backoff = Backoff::new(shared.config.backoff_initial(), shared.config.backoff_max());

    let mut entries = shared.entries.lock();
    loop {
        if shared.stop.load(Ordering::Acquire) {
            break;
        }

        let now = SystemTime::now();
        let mut saturated = false;

        while let Some(head) = entries.peek() {
            if head.start_at > now {
                break;
            }
            let elapsed = elapsed_between(head.start_at, now);
            let recurring = !head.interval.is_zero();

            if recurring && elapsed > tolerance {
                debug!(task = head.task.name(), late_ms = elapsed.as_millis(), "Skipping stale occurrence");
                counters.skipped.fetch_add(1, Ordering::Relaxed);
            } else {
                match shared.pool.enqueue(Arc::clone(&head.task)) {
                    Ok(()) => {
                        backoff.reset();
                        counters.dispatched.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(PoolError::QueueFull { pending, .. }) => {
                        if !backoff.is_backing_off() {
                            warn!(pool = shared.pool.name(), pending = pending, "Thread pool saturated, backing off");
                        }
                        saturated = true;
                        break;
                    }
                    Err(err) => {
                        warn!(task = head.task.name(), error = %err, "Dropping entry, pool unavailable");
                        counters.dropped.fetch_add(1, Ordering::Relaxed);
                        entries.pop();
                        continue;
                    }
                }
            }

            if let Some(entry) = entries.pop() {
                if recurring {
                    match next_start_time(now, elapsed, entry.interval, min_interval) {
                        Some(start_at) => entries.push(ScheduledEntry {
                            start_at,
                            interval: entry.interval,
                            seq: shared.next_seq(),
                            task: Arc::new(entry.task.next_occurrence()),
                        }),
                        None => {
                            warn!(task = entry.task.name(), "Next occurrence overflows the clock, dropping recurrence");
                            counters.dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            }
        }

        if saturated {
            let delay = backoff.next_delay();
            counters.backpressure_retries.fetch_add(1, Ordering::Relaxed);
            shared.wake.wait_for(&mut entries, delay);
            continue;
        }

        match entries.peek().map(|head| head.start_at) {
            None => shared.wake.wait(&mut entries),
            Some(start_at) => {
                let timeout = elapsed_between(SystemTime::now(), start_at);
                if !timeout.is_zero() {
                    shared.wake.wait_for(&mut entries, timeout);
                }
            }
        }
    }
}
