//! Announce cycle: which tracker to ask next, when, and what happened.
//!
//! The orchestrator drives an [`AnnounceCycle`] through one attempt at a time
//! and reports exactly one outcome per attempt. [`TieredAnnounce`] is the
//! tier bookkeeping used by default; response decoding is delegated to a
//! [`ResponseParser`].

mod tiered;

use thiserror::Error;

pub use tiered::{AnnounceReply, ResponseParser, TieredAnnounce, DEFAULT_ANNOUNCE_INTERVAL};

/// A tracker response that could not be used.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The body could not be decoded.
    #[error("malformed tracker response: {0}")]
    Malformed(String),
    /// The tracker answered with a failure reason.
    #[error("tracker rejected announce: {0}")]
    Rejected(String),
}

/// Result of one announce attempt as recorded by the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnounceOutcome {
    /// Response fetched and accepted.
    Success,
    /// Fetch or parse failed; another tracker may still be tried this pass.
    Failure,
    /// The failure used up every tier for this pass; the cycle was reset.
    Exhausted,
}

/// Tiered announce bookkeeping consumed by the orchestrator.
pub trait AnnounceCycle {
    /// No announce opportunity will ever come again.
    fn permanently_exhausted(&self) -> bool;

    /// An attempt may start now (no cooldown pending, an eligible tier exists).
    fn is_ready(&self) -> bool;

    /// URL of the tracker to ask next.
    fn next_url(&self) -> Option<String>;

    /// An attempt against the current tracker has started.
    fn report_started(&mut self);

    /// The last attempt succeeded. Resets cooldown timers for a fresh cycle.
    fn report_success(&mut self);

    /// The last attempt failed; move on to the next tracker.
    fn report_failure(&mut self);

    /// Every tier has failed in the current pass.
    fn all_tiers_failed_this_pass(&self) -> bool;

    /// Start a new pass from the first tier.
    fn reset_cycle(&mut self);

    /// Decode and apply a tracker response body.
    fn accept_response(&mut self, body: &[u8]) -> Result<(), ParseError>;
}
