use std::time::Duration;

/// What went wrong with an attempt, as far as retrying is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connect or transfer timeout.
    Timeout,
    /// Tracker asked us to back off (429, 503).
    Throttled,
    /// Could not reach the tracker, or the connection broke.
    Connection,
    /// Other 5xx; the tracker may recover.
    Http5xx(u16),
    /// Anything a second attempt will not fix.
    Other,
}

/// Outcome of [`RetryPolicy::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    NoRetry,
    /// Start another attempt once the delay has passed.
    RetryAfter(Duration),
}

/// Attempt budget of one fetch job plus the (doubling) wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first. Never below 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` tries, waiting `wait` before the second and doubling
    /// after that, capped at eight times `wait`.
    pub fn with_budget(max_attempts: u32, wait: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: wait,
            max_delay: wait.saturating_mul(8),
        }
    }

    /// Decide after attempt number `attempt` (1-based) failed with `kind`.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if attempt >= self.max_attempts || kind == ErrorKind::Other {
            return RetryDecision::NoRetry;
        }
        let factor = 1u32 << attempt.saturating_sub(1).min(8);
        RetryDecision::RetryAfter(self.base_delay.saturating_mul(factor).min(self.max_delay))
    }
}
