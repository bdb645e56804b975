//! The announce orchestrator: a recurring task that keeps one download in
//! touch with its trackers.
//!
//! Each poll advances exactly one of: halt drain, exhaustion, job creation,
//! success handling or failure handling. The orchestrator owns at most one
//! fetch job at a time and consumes its outcome in the same poll it observes
//! the job terminal, before it can create another.

use std::sync::Arc;

use crate::announce::{AnnounceCycle, AnnounceOutcome, ResponseParser, TieredAnnounce};
use crate::config::TrackwatchConfig;
use crate::download::Download;
use crate::drain::drain_response;
use crate::fetch::{CurlFetchFactory, FetchJob, FetchJobFactory, FetchJobSpec, FetchJobState, JobId};
use crate::peer::{bootstrap_peers, BtRuntime, PeerConnector, PeerPool, PieceStorage, Swarm};
use crate::scheduler::{Poll, Scheduler, Task};

/// Where the orchestrator is between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// No fetch job.
    Idle,
    /// A fetch job is working.
    Running,
    /// Halt requested; waiting for the job's tasks to wind down.
    Draining,
    /// Finished; the scheduler drops the task.
    Terminated,
}

/// Counters kept for logs and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatcherStats {
    pub jobs_started: u32,
    pub successes: u32,
    pub failures: u32,
    pub cycle_resets: u32,
    pub peers_spawned: usize,
}

/// Recurring announce task for one download.
pub struct AnnounceOrchestrator {
    download: Arc<Download>,
    announce: Box<dyn AnnounceCycle>,
    fetcher: Arc<dyn FetchJobFactory>,
    swarm: Swarm,
    job: Option<FetchJob>,
    state: WatcherState,
    stats: WatcherStats,
    last_outcome: Option<AnnounceOutcome>,
}

impl AnnounceOrchestrator {
    pub fn new(
        download: Arc<Download>,
        announce: Box<dyn AnnounceCycle>,
        fetcher: Arc<dyn FetchJobFactory>,
        swarm: Swarm,
    ) -> Self {
        Self {
            download,
            announce,
            fetcher,
            swarm,
            job: None,
            state: WatcherState::Idle,
            stats: WatcherStats::default(),
            last_outcome: None,
        }
    }

    /// Curl-backed orchestrator walking the download's announce list with
    /// [`TieredAnnounce`]. The configured announce interval becomes the
    /// cooldown between passes and `min_peers` the bootstrap target. The
    /// runtime is returned so the caller can halt it and count connections.
    pub fn from_config(
        cfg: &TrackwatchConfig,
        download: Arc<Download>,
        parser: Box<dyn ResponseParser>,
        peers: Arc<dyn PeerPool>,
        pieces: Arc<dyn PieceStorage>,
        connector: Arc<dyn PeerConnector>,
    ) -> (Self, Arc<BtRuntime>) {
        let runtime = BtRuntime::from_config(cfg);
        let announce =
            TieredAnnounce::from_config(download.announce_list(), cfg, parser, Arc::clone(&peers));
        let swarm = Swarm {
            runtime: runtime.clone(),
            peers,
            pieces,
            connector,
        };
        let orchestrator = Self::new(
            download,
            Box::new(announce),
            Arc::new(CurlFetchFactory::new()),
            swarm,
        );
        (orchestrator, runtime)
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    pub fn stats(&self) -> WatcherStats {
        self.stats
    }

    pub fn last_outcome(&self) -> Option<AnnounceOutcome> {
        self.last_outcome
    }

    pub fn active_job_id(&self) -> Option<JobId> {
        self.job.as_ref().map(FetchJob::id)
    }

    /// One transition. Halt dominates, then exhaustion, then job handling.
    fn step(&mut self, sched: &mut dyn Scheduler) -> WatcherState {
        if self.download.is_force_halt_requested() {
            return self.drain_for_halt();
        }
        if self.announce.permanently_exhausted() {
            tracing::debug!(gid = self.download.gid(), "no more announce");
            if let Some(job) = self.job.take() {
                job.request_halt();
            }
            return WatcherState::Terminated;
        }
        match self.job.as_ref().map(FetchJob::state) {
            None => self.start_announce(sched),
            Some(FetchJobState::Running) => WatcherState::Running,
            Some(FetchJobState::Completed) => self.finish_completed(sched),
            Some(FetchJobState::Failed) => self.finish_failed(),
        }
    }

    /// A job that has no tasks left or already completed is let go; a job still
    /// working is asked to halt and re-checked on the next poll.
    fn drain_for_halt(&mut self) -> WatcherState {
        let Some(job) = self.job.as_ref() else {
            return WatcherState::Terminated;
        };
        if job.outstanding_tasks() == 0 || job.is_completed() {
            tracing::debug!(gid = self.download.gid(), job = %job.id(), "tracker request job stopped, terminating");
            self.job = None;
            return WatcherState::Terminated;
        }
        if !job.is_halt_requested() {
            tracing::debug!(
                gid = self.download.gid(),
                job = %job.id(),
                outstanding = job.outstanding_tasks(),
                "halt requested, stopping tracker request job"
            );
            job.request_halt();
        }
        WatcherState::Draining
    }

    fn start_announce(&mut self, sched: &mut dyn Scheduler) -> WatcherState {
        if !self.announce.is_ready() {
            return WatcherState::Idle;
        }
        let Some(url) = self.announce.next_url() else {
            return WatcherState::Idle;
        };
        if self.download.has_backup_trackers() {
            tracing::debug!(gid = self.download.gid(), "this is multi-tracker announce");
        } else {
            tracing::debug!(gid = self.download.gid(), "this is single-tracker announce");
        }
        let spec = FetchJobSpec::for_announce(&url, self.download.tracker_settings());
        match self.fetcher.create(spec) {
            Ok(mut job) => {
                tracing::info!(gid = self.download.gid(), job = %job.id(), %url, "creating tracker request job");
                let tasks = job.take_initial_tasks();
                let count = tasks.len();
                sched.schedule_many(tasks);
                tracing::debug!(gid = self.download.gid(), count, "added tracker request task(s)");
                self.announce.report_started();
                self.stats.jobs_started += 1;
                self.job = Some(job);
                WatcherState::Running
            }
            Err(e) => {
                tracing::error!(gid = self.download.gid(), %url, "could not create tracker request job: {}", e);
                self.announce.report_started();
                self.record_failure();
                WatcherState::Idle
            }
        }
    }

    fn finish_completed(&mut self, sched: &mut dyn Scheduler) -> WatcherState {
        let Some(job) = self.job.take() else {
            return WatcherState::Idle;
        };
        match drain_response(job.body()) {
            Ok(body) => match self.announce.accept_response(&body) {
                Ok(()) => {
                    tracing::debug!(gid = self.download.gid(), job = %job.id(), bytes = body.len(), "tracker response processed");
                    self.announce.report_success();
                    self.stats.successes += 1;
                    self.last_outcome = Some(AnnounceOutcome::Success);
                }
                Err(e) => {
                    tracing::error!(gid = self.download.gid(), job = %job.id(), "tracker response rejected: {}", e);
                    self.record_failure();
                }
            },
            Err(e) => {
                tracing::error!(gid = self.download.gid(), job = %job.id(), "could not read tracker response: {}", e);
                self.record_failure();
            }
        }
        drop(job);

        let spawned = bootstrap_peers(&self.download, &self.swarm, sched);
        self.stats.peers_spawned += spawned;
        WatcherState::Idle
    }

    fn finish_failed(&mut self) -> WatcherState {
        if let Some(job) = self.job.take() {
            tracing::warn!(
                gid = self.download.gid(),
                job = %job.id(),
                attempts = job.status().attempts(),
                error = job.status().last_error().as_deref().unwrap_or("no response"),
                "tracker request job failed"
            );
        }
        self.record_failure();
        WatcherState::Idle
    }

    /// Report a failure; reset the cycle when it used up every tier.
    fn record_failure(&mut self) -> AnnounceOutcome {
        self.announce.report_failure();
        self.stats.failures += 1;
        let outcome = if self.announce.all_tiers_failed_this_pass() {
            tracing::debug!(gid = self.download.gid(), "all trackers failed, resetting announce cycle");
            self.announce.reset_cycle();
            self.stats.cycle_resets += 1;
            AnnounceOutcome::Exhausted
        } else {
            AnnounceOutcome::Failure
        };
        self.last_outcome = Some(outcome);
        outcome
    }
}

impl Task for AnnounceOrchestrator {
    fn poll(&mut self, sched: &mut dyn Scheduler) -> Poll {
        if self.state == WatcherState::Terminated {
            return Poll::Done;
        }
        self.state = self.step(sched);
        match self.state {
            WatcherState::Terminated => Poll::Done,
            _ => Poll::Pending,
        }
    }

    fn name(&self) -> &str {
        "tracker-watcher"
    }
}
