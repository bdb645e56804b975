//! Tracker announce orchestration for BitTorrent downloads.
//!
//! An [`orchestrator::AnnounceOrchestrator`] runs as a recurring task on a
//! cooperative [`scheduler::Scheduler`]. Each poll it drives at most one
//! ephemeral HTTP fetch job against the tracker picked by an
//! [`announce::AnnounceCycle`], feeds the response back to the cycle, and
//! turns pooled peers into connection tasks.

pub mod announce;
pub mod config;
pub mod download;
pub mod drain;
pub mod fetch;
pub mod logging;
pub mod orchestrator;
pub mod peer;
pub mod retry;
pub mod scheduler;
