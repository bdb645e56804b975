//! Ephemeral tracker fetch jobs.
//!
//! A fetch job is one announce attempt: a single URL fetched into memory with
//! a small retry budget and no storage side effects. The orchestrator owns at
//! most one job at a time and only ever observes it through its shared
//! [`JobStatus`] (outstanding task count, completion, halt flag).

mod job;
mod sink;
mod spec;
mod transfer;

pub use job::{FetchJob, FetchJobFactory, FetchJobState, JobId, JobStatus, TaskGuard};
pub use sink::MemorySink;
pub use spec::{FetchJobSpec, ANNOUNCE_ARTIFACT_NAME, ANNOUNCE_MAX_TRIES};
pub use transfer::{CurlFetchFactory, CurlTransferTask};

pub use crate::retry::FetchError;
