//! `trackwatch probe` – one ephemeral announce fetch, printed to stdout.

use std::io::Write;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use trackwatch_core::config::TrackwatchConfig;
use trackwatch_core::download::TrackerSettings;
use trackwatch_core::drain::drain_response;
use trackwatch_core::fetch::{CurlFetchFactory, FetchJobFactory, FetchJobSpec, FetchJobState, ANNOUNCE_MAX_TRIES};
use trackwatch_core::scheduler::{LocalScheduler, Scheduler};

const TICK: Duration = Duration::from_millis(5);

pub async fn run_probe(cfg: &TrackwatchConfig, url: &str, hex: bool) -> Result<()> {
    let settings = cfg.tracker.settings();
    let url = url.to_string();
    let body = tokio::task::spawn_blocking(move || fetch_once(&url, &settings))
        .await
        .context("probe task panicked")??;

    println!("{} bytes", body.len());
    if hex {
        println!("{}", hex::encode(&body));
    } else {
        let mut out = std::io::stdout().lock();
        out.write_all(&body)?;
        out.write_all(b"\n")?;
    }
    Ok(())
}

/// Longest a job may take: every attempt hitting its timeout plus the waits
/// in between, with a little slack.
fn tick_budget(settings: &TrackerSettings) -> u64 {
    let tries = ANNOUNCE_MAX_TRIES;
    let worst = settings.timeout.saturating_mul(tries)
        + settings.retry_wait.saturating_mul(8 * tries)
        + Duration::from_secs(1);
    (worst.as_millis() / TICK.as_millis()) as u64 + 1
}

fn fetch_once(url: &str, settings: &TrackerSettings) -> Result<Vec<u8>> {
    let factory = CurlFetchFactory::new();
    let mut job = factory.create(FetchJobSpec::for_announce(url, settings))?;
    tracing::info!(job = %job.id(), %url, "probing tracker");

    let mut sched = LocalScheduler::new().with_tick_interval(TICK);
    sched.schedule_many(job.take_initial_tasks());
    if !sched.run_until_idle(tick_budget(settings)) {
        job.request_halt();
        sched.run_until_idle(10);
        bail!("tracker request did not finish in time");
    }

    match job.state() {
        FetchJobState::Completed => Ok(drain_response(job.body())?),
        _ => bail!(
            "tracker request failed after {} attempt(s): {}",
            job.status().attempts(),
            job.status().last_error().unwrap_or_else(|| "no response".to_string())
        ),
    }
}
