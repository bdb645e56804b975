//! Fetch job error type for retry classification and failure reporting.

use thiserror::Error;

/// Why a tracker fetch attempt (or the whole job) did not produce a response.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Curl reported an error (timeout, connection, etc.).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// Curl multi handle reported an error.
    #[error("curl multi: {0}")]
    Multi(#[from] curl::MultiError),
    /// HTTP response had a non-2xx status.
    #[error("HTTP {0}")]
    Http(u32),
    /// Announce URL could not be parsed.
    #[error("invalid announce URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    /// The job only speaks HTTP(S).
    #[error("unsupported tracker scheme: {0}")]
    UnsupportedScheme(String),
    /// The job was asked to stop before it finished.
    #[error("fetch halted")]
    Halted,
    /// Reading the in-memory response back failed.
    #[error("response drain: {0}")]
    Drain(#[from] std::io::Error),
}
