//! The owning download as seen by the announce loop.
//!
//! Holds what tracker fetch jobs are derived from (tracker timeouts, the
//! announce list) and the download-wide force-halt flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::TrackwatchConfig;

/// Tracker-specific request settings copied into every announce fetch job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerSettings {
    /// Whole-transfer timeout for one attempt.
    pub timeout: Duration,
    /// Connect timeout for one attempt.
    pub connect_timeout: Duration,
    /// Wait between the attempts of one fetch job.
    pub retry_wait: Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(60),
            retry_wait: Duration::ZERO,
        }
    }
}

/// One download (torrent) that owns an announce orchestrator.
#[derive(Debug)]
pub struct Download {
    gid: u64,
    name: String,
    announce_list: Vec<Vec<String>>,
    tracker: TrackerSettings,
    force_halt: AtomicBool,
}

impl Download {
    pub fn new(
        gid: u64,
        name: impl Into<String>,
        announce_list: Vec<Vec<String>>,
        tracker: TrackerSettings,
    ) -> Self {
        Self {
            gid,
            name: name.into(),
            announce_list,
            tracker,
            force_halt: AtomicBool::new(false),
        }
    }

    /// Download whose tracker settings come from the `[tracker]` config section.
    pub fn from_config(
        gid: u64,
        name: impl Into<String>,
        announce_list: Vec<Vec<String>>,
        cfg: &TrackwatchConfig,
    ) -> Self {
        Self::new(gid, name, announce_list, cfg.tracker.settings())
    }

    pub fn gid(&self) -> u64 {
        self.gid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tiers of announce URLs, first tier first.
    pub fn announce_list(&self) -> &[Vec<String>] {
        &self.announce_list
    }

    pub fn tracker_settings(&self) -> &TrackerSettings {
        &self.tracker
    }

    /// True when more than one tracker URL exists across the announce list.
    /// Only reported in logs; it never changes fetch policy.
    pub fn has_backup_trackers(&self) -> bool {
        match self.announce_list.as_slice() {
            [] => false,
            [only] => only.len() >= 2,
            _ => true,
        }
    }

    /// Ask everything working for this download to stop.
    pub fn request_force_halt(&self) {
        self.force_halt.store(true, Ordering::Release);
    }

    pub fn is_force_halt_requested(&self) -> bool {
        self.force_halt.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiers(spec: &[&[&str]]) -> Vec<Vec<String>> {
        spec.iter()
            .map(|t| t.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn backup_trackers_detection() {
        let none = Download::new(1, "t", Vec::new(), TrackerSettings::default());
        assert!(!none.has_backup_trackers());

        let single = Download::new(1, "t", tiers(&[&["http://a/announce"]]), TrackerSettings::default());
        assert!(!single.has_backup_trackers());

        let same_tier = Download::new(
            1,
            "t",
            tiers(&[&["http://a/announce", "http://b/announce"]]),
            TrackerSettings::default(),
        );
        assert!(same_tier.has_backup_trackers());

        let two_tiers = Download::new(
            1,
            "t",
            tiers(&[&["http://a/announce"], &["http://b/announce"]]),
            TrackerSettings::default(),
        );
        assert!(two_tiers.has_backup_trackers());
    }

    #[test]
    fn force_halt_flag() {
        let d = Download::new(7, "t", Vec::new(), TrackerSettings::default());
        assert!(!d.is_force_halt_requested());
        d.request_force_halt();
        assert!(d.is_force_halt_requested());
        assert_eq!(d.gid(), 7);
    }

    #[test]
    fn tracker_settings_from_config() {
        let mut cfg = TrackwatchConfig::default();
        cfg.tracker.timeout_secs = 7;
        cfg.tracker.retry_wait_secs = 0.25;
        let d = Download::from_config(3, "x", tiers(&[&["http://a"]]), &cfg);
        assert_eq!(d.tracker_settings().timeout, Duration::from_secs(7));
        assert_eq!(d.tracker_settings().connect_timeout, Duration::from_secs(60));
        assert_eq!(d.tracker_settings().retry_wait, Duration::from_millis(250));
    }
}
