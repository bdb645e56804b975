//! Task and scheduler interfaces.

use std::fmt;

/// Identifier minted by the scheduler for each task (peer connection, transfer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of polling a task once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    /// The task wants to be polled again on a later tick.
    Pending,
    /// The task is finished and will be dropped.
    Done,
}

/// A unit of cooperative work.
pub trait Task {
    /// Advance the task by one step. Must not block.
    fn poll(&mut self, sched: &mut dyn Scheduler) -> Poll;

    /// Short label for logs.
    fn name(&self) -> &str {
        "task"
    }
}

/// What a task may ask of the scheduler that polls it.
pub trait Scheduler {
    /// Mint a fresh task identifier.
    fn new_task_id(&mut self) -> TaskId;

    /// Queue a new task; it is first polled on a later tick.
    fn schedule(&mut self, task: Box<dyn Task>);

    /// Queue several tasks, preserving order.
    fn schedule_many(&mut self, tasks: Vec<Box<dyn Task>>) {
        for task in tasks {
            self.schedule(task);
        }
    }
}
