//! Retry and backoff policy for tracker fetch jobs.
//!
//! This module classifies fetch errors (timeouts, throttling, connection
//! failures) and decides whether another attempt is allowed and how long to
//! wait before it. The attempt budget comes from the fetch job, not from here.

mod classify;
mod error;
mod policy;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use error::FetchError;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
