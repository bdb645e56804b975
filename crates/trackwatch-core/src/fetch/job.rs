//! Fetch job lifecycle: shared status, task accounting, and the job handle.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::drain::ReadAt;
use crate::retry::FetchError;
use crate::scheduler::Task;

use super::spec::FetchJobSpec;

/// Identifier of one fetch job (shown in logs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Where a fetch job is in its life, as observed by polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchJobState {
    /// Underlying tasks are still working.
    Running,
    /// All bytes fetched.
    Completed,
    /// No underlying task is left and the job never completed.
    Failed,
}

/// State shared between a job and the tasks working for it.
#[derive(Debug, Default)]
pub struct JobStatus {
    outstanding: AtomicUsize,
    completed: AtomicBool,
    halt_requested: AtomicBool,
    attempts: AtomicU32,
    last_error: Mutex<Option<String>>,
}

impl JobStatus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Count one more underlying task until the returned guard is dropped.
    pub fn enter(self: &Arc<Self>) -> TaskGuard {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        TaskGuard {
            status: Arc::clone(self),
        }
    }

    /// Underlying tasks not yet finished.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    pub fn mark_completed(&self) {
        self.completed.store(true, Ordering::Release);
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    pub fn request_halt(&self) {
        self.halt_requested.store(true, Ordering::Release);
    }

    pub fn is_halt_requested(&self) -> bool {
        self.halt_requested.load(Ordering::Acquire)
    }

    /// Record the start of an attempt; returns its 1-based number.
    pub fn record_attempt(&self) -> u32 {
        self.attempts.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Acquire)
    }

    pub fn record_error(&self, err: &FetchError) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(err.to_string());
    }

    /// Message of the error that ended the last attempt, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Keeps a task counted as outstanding for its job. Released on drop.
#[derive(Debug)]
pub struct TaskGuard {
    status: Arc<JobStatus>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.status.outstanding.fetch_sub(1, Ordering::AcqRel);
    }
}

/// One announce attempt. Owned by a single orchestrator; its tasks run in the
/// scheduler and report back only through [`JobStatus`].
pub struct FetchJob {
    id: JobId,
    spec: FetchJobSpec,
    body: Box<dyn ReadAt + Send + Sync>,
    status: Arc<JobStatus>,
    initial_tasks: Vec<Box<dyn Task>>,
}

impl fmt::Debug for FetchJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchJob")
            .field("id", &self.id)
            .field("url", &self.spec.url())
            .field("status", &self.status)
            .field("pending_tasks", &self.initial_tasks.len())
            .finish()
    }
}

impl FetchJob {
    /// `body` is where the orchestrator reads the response back from once the
    /// job completed; usually a clone of the sink its tasks write into.
    pub fn new<R>(id: JobId, spec: FetchJobSpec, body: R, status: Arc<JobStatus>) -> Self
    where
        R: ReadAt + Send + Sync + 'static,
    {
        Self {
            id,
            spec,
            body: Box::new(body),
            status,
            initial_tasks: Vec::new(),
        }
    }

    /// Add a task to hand to the scheduler when the job starts. The task should
    /// hold a [`TaskGuard`] from this job's status for as long as it runs.
    pub fn with_task(mut self, task: Box<dyn Task>) -> Self {
        self.initial_tasks.push(task);
        self
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn spec(&self) -> &FetchJobSpec {
        &self.spec
    }

    pub fn body(&self) -> &dyn ReadAt {
        self.body.as_ref()
    }

    pub fn status(&self) -> &Arc<JobStatus> {
        &self.status
    }

    /// Move the job's bootstrap tasks out for scheduling. Empty after the first call.
    pub fn take_initial_tasks(&mut self) -> Vec<Box<dyn Task>> {
        std::mem::take(&mut self.initial_tasks)
    }

    pub fn outstanding_tasks(&self) -> usize {
        self.status.outstanding()
    }

    pub fn is_completed(&self) -> bool {
        self.status.is_completed()
    }

    /// Ask the job's tasks to wind down. They stop at their next poll.
    pub fn request_halt(&self) {
        self.status.request_halt();
    }

    pub fn is_halt_requested(&self) -> bool {
        self.status.is_halt_requested()
    }

    pub fn state(&self) -> FetchJobState {
        if self.status.is_completed() {
            FetchJobState::Completed
        } else if self.status.outstanding() == 0 {
            FetchJobState::Failed
        } else {
            FetchJobState::Running
        }
    }
}

/// Builds fetch jobs from a [`FetchJobSpec`].
pub trait FetchJobFactory {
    fn create(&self, spec: FetchJobSpec) -> Result<FetchJob, FetchError>;
}
