//! Cooperative task scheduling.
//!
//! Every unit of work (the announce orchestrator, fetch transfers, peer
//! connection attempts) is a [`Task`] polled by a single-threaded run queue.
//! A poll runs to completion without blocking; a task that has more work to
//! do returns [`Poll::Pending`] and the scheduler re-queues it.

mod local;
mod task;

pub use local::LocalScheduler;
pub use task::{Poll, Scheduler, Task, TaskId};
