//! Construction parameters for a fetch job.

use std::time::Duration;

use crate::download::TrackerSettings;

/// Attempts per tracker URL. Tier failover, not this count, is how
/// multi-tracker torrents get extra chances.
pub const ANNOUNCE_MAX_TRIES: u32 = 2;

/// Synthetic file name of the in-memory announce artifact.
pub const ANNOUNCE_ARTIFACT_NAME: &str = "[tracker.announce]";

/// Everything a [`super::FetchJobFactory`] needs to build a job.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchJobSpec {
    /// Target URLs. Announce jobs always carry exactly one.
    pub urls: Vec<String>,
    /// Artifact name (no directory).
    pub name: String,
    /// Attempts before the job fails.
    pub max_tries: u32,
    /// Probe with HEAD before GET.
    pub use_head: bool,
    /// Whole-transfer timeout per attempt.
    pub timeout: Duration,
    /// Connect timeout per attempt.
    pub connect_timeout: Duration,
    /// Wait between attempts.
    pub retry_wait: Duration,
    /// Write the body into memory instead of a file.
    pub in_memory: bool,
    /// Pre-allocate the output file.
    pub file_allocation: bool,
    /// Check for an existing local file before starting.
    pub pre_local_file_check: bool,
    /// Allow the response Content-Type to turn the job into something else
    /// (e.g. a metalink).
    pub content_type_reinterpretation: bool,
}

impl FetchJobSpec {
    /// Job for one announce request to `url`, with timeouts copied from the
    /// download's tracker settings.
    pub fn for_announce(url: &str, settings: &TrackerSettings) -> Self {
        Self {
            urls: vec![url.to_string()],
            name: ANNOUNCE_ARTIFACT_NAME.to_string(),
            max_tries: ANNOUNCE_MAX_TRIES,
            use_head: false,
            timeout: settings.timeout,
            connect_timeout: settings.connect_timeout,
            retry_wait: settings.retry_wait,
            in_memory: true,
            file_allocation: false,
            pre_local_file_check: false,
            content_type_reinterpretation: false,
        }
    }

    /// The single target URL, if any.
    pub fn url(&self) -> Option<&str> {
        self.urls.first().map(String::as_str)
    }
}
