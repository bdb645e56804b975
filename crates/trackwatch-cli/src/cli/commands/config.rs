//! `trackwatch config` – show where the config lives and what is in effect.

use anyhow::Result;
use trackwatch_core::config::{self, TrackwatchConfig};

pub fn run_config(cfg: &TrackwatchConfig) -> Result<()> {
    println!("config file: {}", config::config_path()?.display());
    println!("min_peers:              {}", cfg.min_peers);
    match cfg.announce_interval() {
        Some(interval) => println!("announce interval:      {}s (fixed)", interval.as_secs()),
        None => println!("announce interval:      tracker-provided"),
    }
    let tracker = cfg.tracker.settings();
    println!("tracker timeout:        {:?}", tracker.timeout);
    println!("tracker connect timeout: {:?}", tracker.connect_timeout);
    println!("tracker retry wait:     {:?}", tracker.retry_wait);
    Ok(())
}
