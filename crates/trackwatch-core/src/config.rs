use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::download::TrackerSettings;

/// Longest wait between the two attempts of an announce.
pub const MAX_RETRY_WAIT: Duration = Duration::from_secs(3600);

/// Tracker request settings (the `[tracker]` section of config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Whole-request timeout in seconds for one announce attempt.
    pub timeout_secs: u64,
    /// Connect timeout in seconds for one announce attempt.
    pub connect_timeout_secs: u64,
    /// Wait in seconds between the two attempts of an announce (e.g. 0.5 = 500ms).
    /// Capped at [`MAX_RETRY_WAIT`].
    pub retry_wait_secs: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            connect_timeout_secs: 60,
            retry_wait_secs: 0.0,
        }
    }
}

impl TrackerConfig {
    /// Runtime settings copied into every announce fetch job.
    pub fn settings(&self) -> TrackerSettings {
        // NaN and negatives fail the comparison.
        let retry_wait = if self.retry_wait_secs > 0.0 {
            Duration::try_from_secs_f64(self.retry_wait_secs)
                .map_or(MAX_RETRY_WAIT, |wait| wait.min(MAX_RETRY_WAIT))
        } else {
            Duration::ZERO
        };
        TrackerSettings {
            timeout: Duration::from_secs(self.timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            retry_wait,
        }
    }
}

/// Global configuration loaded from `~/.config/trackwatch/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackwatchConfig {
    /// Keep opening peer connections while fewer than this many are
    /// connected or connecting.
    pub min_peers: usize,
    /// Fixed cooldown between announce passes in seconds; 0 follows the
    /// interval the tracker asks for.
    #[serde(default)]
    pub announce_interval_secs: u64,
    #[serde(default)]
    pub tracker: TrackerConfig,
}

impl Default for TrackwatchConfig {
    fn default() -> Self {
        Self {
            min_peers: 40,
            announce_interval_secs: 0,
            tracker: TrackerConfig::default(),
        }
    }
}

impl TrackwatchConfig {
    /// User override for the announce cooldown, if one is set.
    pub fn announce_interval(&self) -> Option<Duration> {
        (self.announce_interval_secs > 0).then(|| Duration::from_secs(self.announce_interval_secs))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("trackwatch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<TrackwatchConfig> {
    load_or_init_at(&config_path()?)
}

/// Same as [`load_or_init`] for an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<TrackwatchConfig> {
    if !path.exists() {
        let default_cfg = TrackwatchConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)?;
    let cfg: TrackwatchConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = TrackwatchConfig::default();
        assert_eq!(cfg.min_peers, 40);
        assert_eq!(cfg.announce_interval(), None);
        assert_eq!(cfg.tracker.timeout_secs, 60);
        assert_eq!(cfg.tracker.connect_timeout_secs, 60);
        assert_eq!(cfg.tracker.settings(), TrackerSettings::default());
    }

    #[test]
    fn config_toml_tracker_section() {
        let toml = r#"
            min_peers = 55
            announce_interval_secs = 120

            [tracker]
            timeout_secs = 20
            connect_timeout_secs = 5
            retry_wait_secs = 0.5
        "#;
        let cfg: TrackwatchConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.min_peers, 55);
        assert_eq!(cfg.announce_interval(), Some(Duration::from_secs(120)));
        let settings = cfg.tracker.settings();
        assert_eq!(settings.timeout, Duration::from_secs(20));
        assert_eq!(settings.connect_timeout, Duration::from_secs(5));
        assert_eq!(settings.retry_wait, Duration::from_millis(500));
    }

    #[test]
    fn config_toml_missing_sections_use_defaults() {
        let cfg: TrackwatchConfig = toml::from_str("min_peers = 10").unwrap();
        assert_eq!(cfg.min_peers, 10);
        assert_eq!(cfg.announce_interval_secs, 0);
        assert_eq!(cfg.tracker, TrackerConfig::default());

        let partial = r#"
            min_peers = 10
            [tracker]
            timeout_secs = 15
        "#;
        let cfg: TrackwatchConfig = toml::from_str(partial).unwrap();
        assert_eq!(cfg.tracker.timeout_secs, 15);
        assert_eq!(cfg.tracker.connect_timeout_secs, 60);
    }

    #[test]
    fn negative_retry_wait_is_zero() {
        let tracker = TrackerConfig {
            retry_wait_secs: -3.0,
            ..TrackerConfig::default()
        };
        assert_eq!(tracker.settings().retry_wait, Duration::ZERO);
    }

    #[test]
    fn huge_retry_wait_is_capped() {
        let cfg: TrackwatchConfig =
            toml::from_str("min_peers = 1\n[tracker]\nretry_wait_secs = 1e20\n").unwrap();
        assert_eq!(cfg.tracker.settings().retry_wait, MAX_RETRY_WAIT);

        let tracker = TrackerConfig {
            retry_wait_secs: f64::INFINITY,
            ..TrackerConfig::default()
        };
        assert_eq!(tracker.settings().retry_wait, MAX_RETRY_WAIT);
        let tracker = TrackerConfig {
            retry_wait_secs: f64::NAN,
            ..TrackerConfig::default()
        };
        assert_eq!(tracker.settings().retry_wait, Duration::ZERO);
    }

    #[test]
    fn load_or_init_writes_then_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let created = load_or_init_at(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created, TrackwatchConfig::default());

        fs::write(&path, "min_peers = 7\n[tracker]\ntimeout_secs = 9\n").unwrap();
        let loaded = load_or_init_at(&path).unwrap();
        assert_eq!(loaded.min_peers, 7);
        assert_eq!(loaded.tracker.timeout_secs, 9);
    }
}
