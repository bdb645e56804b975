//! Curl multi backend for fetch jobs.
//!
//! Each transfer task owns one `curl::multi` handle with at most one Easy2
//! transfer in it. Every poll calls `perform` (which never blocks) and checks
//! for a finished message, so network waiting never stalls the scheduler.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::retry::{classify, FetchError, RetryDecision, RetryPolicy};
use crate::scheduler::{Poll, Scheduler, Task};

use super::job::{FetchJob, FetchJobFactory, JobId, JobStatus, TaskGuard};
use super::sink::MemorySink;
use super::spec::FetchJobSpec;

/// Easy2 handler that appends the response body to the job's sink.
pub struct SinkHandler {
    sink: MemorySink,
}

impl curl::easy::Handler for SinkHandler {
    fn write(&mut self, data: &[u8]) -> Result<usize, curl::easy::WriteError> {
        self.sink.append(data);
        Ok(data.len())
    }
}

/// The single underlying task of a curl-backed fetch job.
pub struct CurlTransferTask {
    url: String,
    spec: FetchJobSpec,
    sink: MemorySink,
    status: Arc<JobStatus>,
    policy: RetryPolicy,
    multi: curl::multi::Multi,
    active: Option<curl::multi::Easy2Handle<SinkHandler>>,
    attempt: u32,
    retry_at: Option<Instant>,
    _guard: TaskGuard,
}

impl CurlTransferTask {
    /// Counts itself as outstanding on `status` until dropped.
    pub fn new(url: String, spec: FetchJobSpec, sink: MemorySink, status: Arc<JobStatus>) -> Self {
        let policy = RetryPolicy::with_budget(spec.max_tries, spec.retry_wait);
        let guard = status.enter();
        Self {
            url,
            spec,
            sink,
            status,
            policy,
            multi: curl::multi::Multi::new(),
            active: None,
            attempt: 0,
            retry_at: None,
            _guard: guard,
        }
    }

    fn start_attempt(&mut self) -> Result<(), FetchError> {
        self.attempt = self.status.record_attempt();
        self.sink.clear();
        let mut easy = curl::easy::Easy2::new(SinkHandler {
            sink: self.sink.clone(),
        });
        easy.url(&self.url)?;
        // Plain GET; trackers have no use for a HEAD probe.
        easy.get(true)?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.connect_timeout(self.spec.connect_timeout)?;
        easy.timeout(self.spec.timeout)?;
        self.active = Some(self.multi.add2(easy)?);
        tracing::debug!(url = %self.url, attempt = self.attempt, "tracker request attempt started");
        Ok(())
    }

    /// Returns Ok(true) once the transfer finished with a 2xx response.
    fn drive(&mut self) -> Result<bool, FetchError> {
        self.multi.perform()?;
        let mut finished = None;
        if let Some(handle) = self.active.as_ref() {
            self.multi.messages(|msg| {
                if let Some(res) = msg.result_for2(handle) {
                    finished = Some(res);
                }
            });
        }
        let Some(result) = finished else {
            return Ok(false);
        };
        let Some(handle) = self.active.take() else {
            return Ok(false);
        };
        let easy = self.multi.remove2(handle)?;
        result?;
        let code = easy.response_code()?;
        if !(200..300).contains(&code) {
            return Err(FetchError::Http(code));
        }
        Ok(true)
    }

    fn fail_or_retry(&mut self, err: FetchError) -> Poll {
        self.active = None;
        match self.policy.decide(self.attempt, classify(&err)) {
            RetryDecision::RetryAfter(delay) => {
                tracing::debug!(url = %self.url, attempt = self.attempt, ?delay, "tracker request failed, retrying: {}", err);
                self.retry_at = Some(Instant::now() + delay);
                Poll::Pending
            }
            RetryDecision::NoRetry => {
                tracing::warn!(url = %self.url, attempts = self.attempt, "tracker request failed: {}", err);
                self.status.record_error(&err);
                Poll::Done
            }
        }
    }
}

impl Task for CurlTransferTask {
    fn poll(&mut self, _sched: &mut dyn Scheduler) -> Poll {
        if self.status.is_halt_requested() {
            self.active = None;
            self.status.record_error(&FetchError::Halted);
            return Poll::Done;
        }
        if self.active.is_none() {
            if let Some(at) = self.retry_at {
                if Instant::now() < at {
                    return Poll::Pending;
                }
                self.retry_at = None;
            }
            if let Err(e) = self.start_attempt() {
                return self.fail_or_retry(e);
            }
        }
        match self.drive() {
            Ok(true) => {
                self.status.mark_completed();
                tracing::debug!(url = %self.url, bytes = self.sink.len(), "tracker request completed");
                Poll::Done
            }
            Ok(false) => Poll::Pending,
            Err(e) => self.fail_or_retry(e),
        }
    }

    fn name(&self) -> &str {
        "tracker-fetch"
    }
}

/// Builds curl-backed fetch jobs. Only `http` and `https` targets are accepted.
#[derive(Debug, Default)]
pub struct CurlFetchFactory {
    next_id: AtomicU64,
}

impl CurlFetchFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FetchJobFactory for CurlFetchFactory {
    fn create(&self, spec: FetchJobSpec) -> Result<FetchJob, FetchError> {
        let raw = spec
            .url()
            .ok_or_else(|| FetchError::UnsupportedScheme(String::new()))?
            .to_string();
        let parsed = url::Url::parse(&raw).map_err(|source| FetchError::InvalidUrl {
            url: raw.clone(),
            source,
        })?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => return Err(FetchError::UnsupportedScheme(other.to_string())),
        }

        let id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let sink = MemorySink::new();
        let status = JobStatus::new();
        let task = CurlTransferTask::new(raw, spec.clone(), sink.clone(), Arc::clone(&status));
        Ok(FetchJob::new(id, spec, sink, status).with_task(Box::new(task)))
    }
}
