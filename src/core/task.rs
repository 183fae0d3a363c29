//! Tasks: a shared immutable definition plus a per-occurrence execution record.
//!
//! A [`TaskDefinition`] holds what a task *is* (name, guid, action, optional
//! completion callback) and is shared by `Arc` between every occurrence of a
//! recurring task. A [`Task`] is one invocation record of that definition with
//! its own state machine:
//!
//! ```text
//! NotStarted -> Running -> Complete
//!                      \-> Terminated
//! ```
//!
//! `Complete` is reached as soon as the action returns `Ok`. A failing
//! callback afterwards only attaches an error message; it never moves the task
//! back to `Terminated`.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use super::error::{AppResult, TaskError};
use crate::util::clock::to_epoch_ms;

/// Zero-argument task body or completion callback.
pub type TaskFn = Arc<dyn Fn() -> AppResult<()> + Send + Sync>;

/// Execution state of a task record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskState {
    /// Not run yet.
    #[default]
    NotStarted,
    /// The action is executing.
    Running,
    /// The action returned successfully.
    Complete,
    /// The action failed before completing.
    Terminated,
}

impl TaskState {
    /// Stable label for logs and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "NotStarted",
            Self::Running => "Running",
            Self::Complete => "Complete",
            Self::Terminated => "Terminated",
        }
    }

    /// Whether the record reached a terminal state.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Complete | Self::Terminated)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable identity and behaviour of a task.
#[derive(Clone)]
pub struct TaskDefinition {
    name: String,
    guid: String,
    action: TaskFn,
    callback: Option<TaskFn>,
}

impl TaskDefinition {
    /// Create a definition with a random guid and no callback.
    pub fn new<F>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn() -> AppResult<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            guid: uuid::Uuid::new_v4().to_string(),
            action: Arc::new(action),
            callback: None,
        }
    }

    /// Display label. Not unique.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Correlation id. Not enforced unique.
    #[must_use]
    pub fn guid(&self) -> &str {
        &self.guid
    }

    /// The primary action.
    #[must_use]
    pub fn action(&self) -> TaskFn {
        Arc::clone(&self.action)
    }

    /// The completion callback, if any.
    #[must_use]
    pub fn callback(&self) -> Option<TaskFn> {
        self.callback.clone()
    }
}

impl fmt::Debug for TaskDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDefinition")
            .field("name", &self.name)
            .field("guid", &self.guid)
            .field("has_callback", &self.callback.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default)]
struct ExecutionRecord {
    state: TaskState,
    started_at: Option<SystemTime>,
    completed_at: Option<SystemTime>,
    error_message: Option<String>,
}

/// Serializable point-in-time view of a task for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// Display label.
    pub name: String,
    /// Correlation id.
    pub guid: String,
    /// State at snapshot time.
    pub state: TaskState,
    /// Start time in ms since epoch.
    pub started_at_ms: Option<u128>,
    /// Completion time in ms since epoch.
    pub completed_at_ms: Option<u128>,
    /// Last failure text.
    pub error_message: Option<String>,
}

/// One execution record of a [`TaskDefinition`].
///
/// Every accessor is internally synchronised, so a reporting thread may read a
/// task while a worker runs it. `run` itself holds a per-task lock, so two
/// threads invoking the same record are serialised.
pub struct Task {
    definition: Arc<TaskDefinition>,
    record: RwLock<ExecutionRecord>,
    run_lock: Mutex<()>,
}

impl Task {
    /// Create a task with a random guid and no callback.
    pub fn new<F>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn() -> AppResult<()> + Send + Sync + 'static,
    {
        Self::from_definition(Arc::new(TaskDefinition::new(name, action)))
    }

    /// Create a fresh `NotStarted` record for an existing definition.
    #[must_use]
    pub fn from_definition(definition: Arc<TaskDefinition>) -> Self {
        Self {
            definition,
            record: RwLock::new(ExecutionRecord::default()),
            run_lock: Mutex::new(()),
        }
    }

    /// Replace the correlation id.
    #[must_use]
    pub fn with_guid(mut self, guid: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.definition).guid = guid.into();
        self
    }

    /// Attach a callback that runs after the action succeeds.
    #[must_use]
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn() -> AppResult<()> + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.definition).callback = Some(Arc::new(callback));
        self
    }

    /// Wrap in an `Arc` for submission.
    #[must_use]
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Execute the action, then the callback.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Action`] if the action failed (state becomes
    /// `Terminated`) or [`TaskError::Callback`] if only the callback failed
    /// (state stays `Complete`). Panics in either are caught and reported the
    /// same way. The error text is also stored as the task's error message.
    pub fn run(&self) -> Result<(), TaskError> {
        let _running = self.run_lock.lock();
        {
            let mut record = self.record.write();
            record.started_at = Some(SystemTime::now());
            record.completed_at = None;
            record.state = TaskState::Running;
        }

        let result = invoke(&self.definition.action)
            .map_err(TaskError::Action)
            .and_then(|()| {
                {
                    let mut record = self.record.write();
                    record.state = TaskState::Complete;
                    record.completed_at = Some(SystemTime::now());
                }
                self.definition
                    .callback
                    .as_ref()
                    .map_or(Ok(()), |callback| invoke(callback).map_err(TaskError::Callback))
            });

        if let Err(err) = &result {
            let mut record = self.record.write();
            if record.state != TaskState::Complete {
                record.state = TaskState::Terminated;
            }
            record.error_message = Some(err.to_string());
        }
        result
    }

    /// A new `NotStarted` record sharing this task's definition.
    #[must_use]
    pub fn next_occurrence(&self) -> Self {
        Self::from_definition(Arc::clone(&self.definition))
    }

    /// Shared definition.
    #[must_use]
    pub const fn definition(&self) -> &Arc<TaskDefinition> {
        &self.definition
    }

    /// Display label.
    #[must_use]
    pub fn name(&self) -> &str {
        self.definition.name()
    }

    /// Correlation id.
    #[must_use]
    pub fn guid(&self) -> &str {
        self.definition.guid()
    }

    /// The primary action.
    #[must_use]
    pub fn action(&self) -> TaskFn {
        self.definition.action()
    }

    /// The completion callback, if any.
    #[must_use]
    pub fn callback(&self) -> Option<TaskFn> {
        self.definition.callback()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> TaskState {
        self.record.read().state
    }

    /// Time the last run started.
    #[must_use]
    pub fn started_at(&self) -> Option<SystemTime> {
        self.record.read().started_at
    }

    /// Time the last run completed normally.
    #[must_use]
    pub fn completed_at(&self) -> Option<SystemTime> {
        self.record.read().completed_at
    }

    /// Last failure text.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.record.read().error_message.clone()
    }

    /// Overwrite the failure text.
    pub fn set_error_message(&self, message: impl Into<String>) {
        self.record.write().error_message = Some(message.into());
    }

    /// The action completed but the callback failed afterwards.
    #[must_use]
    pub fn completed_with_callback_failure(&self) -> bool {
        let record = self.record.read();
        record.state == TaskState::Complete && record.error_message.is_some()
    }

    /// Consistent view of identity and state.
    #[must_use]
    pub fn snapshot(&self) -> TaskSnapshot {
        let record = self.record.read();
        TaskSnapshot {
            name: self.definition.name.clone(),
            guid: self.definition.guid.clone(),
            state: record.state,
            started_at_ms: record.started_at.map(to_epoch_ms),
            completed_at_ms: record.completed_at.map(to_epoch_ms),
            error_message: record.error_message.clone(),
        }
    }
}

/// Copies the current state, timestamps and error message into a record with
/// its own locks. Use [`Task::next_occurrence`] for a fresh record instead.
impl Clone for Task {
    fn clone(&self) -> Self {
        Self {
            definition: Arc::clone(&self.definition),
            record: RwLock::new(self.record.read().clone()),
            run_lock: Mutex::new(()),
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name())
            .field("guid", &self.guid())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn invoke(f: &TaskFn) -> Result<(), String> {
    match panic::catch_unwind(AssertUnwindSafe(|| f())) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(format!("{e:#}")),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {msg}")
    } else {
        "unknown error".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_new_task_is_not_started() {
        let task = Task::new("noop", || Ok(()));
        assert_eq!(task.state(), TaskState::NotStarted);
        assert!(task.started_at().is_none());
        assert!(task.completed_at().is_none());
        assert!(task.error_message().is_none());
        assert!(!task.guid().is_empty());
    }

    #[test]
    fn test_successful_run_completes_and_invokes_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let task = Task::new("ok", || Ok(())).with_callback(move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(task.run().is_ok());
        assert_eq!(task.state(), TaskState::Complete);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let started = task.started_at().unwrap();
        let completed = task.completed_at().unwrap();
        assert!(completed >= started);
        assert!(!task.completed_with_callback_failure());
    }

    #[test]
    fn test_action_failure_terminates() {
        let callback_ran = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&callback_ran);
        let task = Task::new("bad", || Err(anyhow::anyhow!("disk on fire"))).with_callback(move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let err = task.run().unwrap_err();
        assert_eq!(err, TaskError::Action("disk on fire".into()));
        assert_eq!(task.state(), TaskState::Terminated);
        assert!(task.completed_at().is_none());
        assert_eq!(
            task.error_message().as_deref(),
            Some("error in primary action: disk on fire")
        );
        assert_eq!(callback_ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_callback_failure_keeps_complete() {
        let task = Task::new("late", || Ok(())).with_callback(|| Err(anyhow::anyhow!("notify failed")));

        let err = task.run().unwrap_err();
        assert!(err.is_callback_failure());
        assert_eq!(task.state(), TaskState::Complete);
        assert!(task.completed_at().is_some());
        assert!(task.completed_with_callback_failure());
        assert_eq!(
            task.error_message().as_deref(),
            Some("error in post-completion callback: notify failed")
        );
    }

    #[test]
    fn test_panicking_action_is_caught() {
        let task = Task::new("panics", || panic!("kaboom"));
        let err = task.run().unwrap_err();
        assert_eq!(err, TaskError::Action("panicked: kaboom".into()));
        assert_eq!(task.state(), TaskState::Terminated);
    }

    #[test]
    fn test_next_occurrence_is_fresh_and_shares_definition() {
        let task = Task::new("tick", || Ok(())).with_guid("guid-1");
        task.run().unwrap();

        let next = task.next_occurrence();
        assert_eq!(next.state(), TaskState::NotStarted);
        assert!(next.started_at().is_none());
        assert_eq!(next.guid(), "guid-1");
        assert!(Arc::ptr_eq(next.definition(), task.definition()));
    }

    #[test]
    fn test_clone_copies_state_with_independent_record() {
        let task = Task::new("copy", || Err(anyhow::anyhow!("nope")));
        let _ = task.run();

        let copy = task.clone();
        assert_eq!(copy.state(), TaskState::Terminated);
        assert_eq!(copy.error_message(), task.error_message());

        copy.set_error_message("edited");
        assert_eq!(copy.error_message().as_deref(), Some("edited"));
        assert_ne!(task.error_message().as_deref(), Some("edited"));
    }

    #[test]
    fn test_concurrent_runs_of_same_record_are_serialised() {
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let (a, m) = (Arc::clone(&active), Arc::clone(&max_seen));
        let task = Arc::new(Task::new("exclusive", move || {
            let now = a.fetch_add(1, Ordering::SeqCst) + 1;
            m.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(10));
            a.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let t = Arc::clone(&task);
                thread::spawn(move || t.run())
            })
            .collect();
        for h in handles {
            h.join().unwrap().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let task = Task::new("report", || Ok(())).with_guid("g");
        task.run().unwrap();
        let snap = task.snapshot();
        assert_eq!(snap.state, TaskState::Complete);
        assert!(snap.completed_at_ms.is_some());

        let json = serde_json::to_string(&snap).unwrap();
        let back: TaskSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }
}
