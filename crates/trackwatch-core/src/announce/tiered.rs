//! Tier bookkeeping over an announce list.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::TrackwatchConfig;
use crate::peer::PeerPool;

use super::{AnnounceCycle, ParseError};

/// Interval used until a tracker tells us otherwise.
pub const DEFAULT_ANNOUNCE_INTERVAL: Duration = Duration::from_secs(1800);

/// The parts of a tracker response the cycle acts on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnounceReply {
    pub interval: Option<Duration>,
    pub min_interval: Option<Duration>,
    pub peers: Vec<SocketAddr>,
    pub failure_reason: Option<String>,
    pub warning: Option<String>,
}

/// Decodes a raw tracker response body.
pub trait ResponseParser {
    fn parse(&self, body: &[u8]) -> Result<AnnounceReply, ParseError>;
}

/// Tiers of tracker URLs tried in order, one attempt in flight at a time.
///
/// Within a pass a failure moves to the next URL of the tier, then to the next
/// tier. A success moves the URL to the front of its tier and starts a fresh
/// pass; so does [`AnnounceCycle::reset_cycle`]. A new pass is ready once the
/// cooldown since the last reset has elapsed (the first announce is ready
/// immediately).
pub struct TieredAnnounce {
    tiers: Vec<VecDeque<String>>,
    tier: usize,
    url_index: usize,
    in_flight: bool,
    interval: Duration,
    min_interval: Duration,
    user_interval: Option<Duration>,
    last_reset: Option<Instant>,
    successes: u32,
    failures: u32,
    final_requested: bool,
    finished: bool,
    parser: Box<dyn ResponseParser>,
    peers: Arc<dyn PeerPool>,
}

impl TieredAnnounce {
    /// Empty tiers and blank URLs are dropped.
    pub fn new(
        announce_list: &[Vec<String>],
        parser: Box<dyn ResponseParser>,
        peers: Arc<dyn PeerPool>,
    ) -> Self {
        let tiers = announce_list
            .iter()
            .map(|tier| {
                tier.iter()
                    .map(|u| u.trim())
                    .filter(|u| !u.is_empty())
                    .map(str::to_string)
                    .collect::<VecDeque<_>>()
            })
            .filter(|tier| !tier.is_empty())
            .collect();
        Self {
            tiers,
            tier: 0,
            url_index: 0,
            in_flight: false,
            interval: DEFAULT_ANNOUNCE_INTERVAL,
            min_interval: DEFAULT_ANNOUNCE_INTERVAL,
            user_interval: None,
            last_reset: None,
            successes: 0,
            failures: 0,
            final_requested: false,
            finished: false,
            parser,
            peers,
        }
    }

    /// Like [`TieredAnnounce::new`], with the configured announce interval (if
    /// any) as a fixed cooldown.
    pub fn from_config(
        announce_list: &[Vec<String>],
        cfg: &TrackwatchConfig,
        parser: Box<dyn ResponseParser>,
        peers: Arc<dyn PeerPool>,
    ) -> Self {
        let cycle = Self::new(announce_list, parser, peers);
        match cfg.announce_interval() {
            Some(interval) => cycle.with_user_interval(interval),
            None => cycle,
        }
    }

    /// Fixed cooldown between passes, overriding what trackers ask for.
    pub fn with_user_interval(mut self, interval: Duration) -> Self {
        self.user_interval = Some(interval);
        self
    }

    /// The next successful announce is the last one.
    pub fn mark_final(&mut self) {
        self.final_requested = true;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn successes(&self) -> u32 {
        self.successes
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Zero-based (tier, url) position of the next attempt.
    pub fn position(&self) -> (usize, usize) {
        (self.tier, self.url_index)
    }

    /// Wait between passes.
    pub fn cooldown(&self) -> Duration {
        self.user_interval.unwrap_or(self.min_interval)
    }

    /// Readiness as of `now`.
    pub fn is_ready_at(&self, now: Instant) -> bool {
        if self.permanently_exhausted() || self.in_flight || self.all_tiers_failed_this_pass() {
            return false;
        }
        match self.last_reset {
            None => true,
            Some(at) => now.saturating_duration_since(at) >= self.cooldown(),
        }
    }

    fn apply(&mut self, reply: AnnounceReply) {
        if let Some(interval) = reply.interval.filter(|d| !d.is_zero()) {
            self.interval = interval;
        }
        self.min_interval = match reply.min_interval.filter(|d| !d.is_zero()) {
            Some(min) => min.min(self.interval),
            None => self.interval,
        };
        if let Some(warning) = reply.warning {
            tracing::warn!("tracker warning: {}", warning);
        }
        let offered = reply.peers.len();
        let added = reply
            .peers
            .into_iter()
            .filter(|addr| self.peers.add_peer(*addr))
            .count();
        tracing::debug!(
            offered,
            added,
            interval_secs = self.interval.as_secs(),
            min_interval_secs = self.min_interval.as_secs(),
            "tracker response accepted"
        );
    }
}

impl AnnounceCycle for TieredAnnounce {
    fn permanently_exhausted(&self) -> bool {
        self.tiers.is_empty() || self.finished
    }

    fn is_ready(&self) -> bool {
        self.is_ready_at(Instant::now())
    }

    fn next_url(&self) -> Option<String> {
        self.tiers.get(self.tier)?.get(self.url_index).cloned()
    }

    fn report_started(&mut self) {
        self.in_flight = true;
    }

    fn report_success(&mut self) {
        self.in_flight = false;
        self.successes += 1;
        if let Some(tier) = self.tiers.get_mut(self.tier) {
            if let Some(url) = tier.remove(self.url_index) {
                tier.push_front(url);
            }
        }
        if self.final_requested {
            self.finished = true;
        }
        self.reset_cycle();
    }

    fn report_failure(&mut self) {
        self.in_flight = false;
        self.failures += 1;
        let Some(tier) = self.tiers.get(self.tier) else {
            return;
        };
        self.url_index += 1;
        if self.url_index >= tier.len() {
            self.tier += 1;
            self.url_index = 0;
        }
    }

    fn all_tiers_failed_this_pass(&self) -> bool {
        self.tier >= self.tiers.len()
    }

    fn reset_cycle(&mut self) {
        self.tier = 0;
        self.url_index = 0;
        self.in_flight = false;
        self.last_reset = Some(Instant::now());
    }

    fn accept_response(&mut self, body: &[u8]) -> Result<(), ParseError> {
        let reply = self.parser.parse(body)?;
        if let Some(reason) = reply.failure_reason.clone() {
            return Err(ParseError::Rejected(reason));
        }
        self.apply(reply);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::PeerStore;

    /// `interval=<secs>;min=<secs>;peer=<addr>;fail=<reason>` pairs.
    struct KvParser;

    impl ResponseParser for KvParser {
        fn parse(&self, body: &[u8]) -> Result<AnnounceReply, ParseError> {
            let text = std::str::from_utf8(body).map_err(|e| ParseError::Malformed(e.to_string()))?;
            let mut reply = AnnounceReply::default();
            for field in text.split(';').filter(|f| !f.is_empty()) {
                let (k, v) = field
                    .split_once('=')
                    .ok_or_else(|| ParseError::Malformed(field.to_string()))?;
                match k {
                    "interval" => reply.interval = v.parse().ok().map(Duration::from_secs),
                    "min" => reply.min_interval = v.parse().ok().map(Duration::from_secs),
                    "peer" => reply
                        .peers
                        .push(v.parse().map_err(|_| ParseError::Malformed(v.to_string()))?),
                    "fail" => reply.failure_reason = Some(v.to_string()),
                    _ => return Err(ParseError::Malformed(k.to_string())),
                }
            }
            Ok(reply)
        }
    }

    fn list(spec: &[&[&str]]) -> Vec<Vec<String>> {
        spec.iter()
            .map(|t| t.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    fn cycle(spec: &[&[&str]]) -> (TieredAnnounce, Arc<PeerStore>) {
        let store = Arc::new(PeerStore::new());
        let cycle = TieredAnnounce::new(&list(spec), Box::new(KvParser), store.clone());
        (cycle, store)
    }

    #[test]
    fn no_tiers_is_permanently_exhausted() {
        let (c, _) = cycle(&[&[], &["  "]]);
        assert!(c.permanently_exhausted());
        assert!(!c.is_ready());
        assert!(c.next_url().is_none());
    }

    #[test]
    fn first_announce_is_ready_and_blocks_while_in_flight() {
        let (mut c, _) = cycle(&[&["http://a/announce"]]);
        assert!(c.is_ready());
        assert_eq!(c.next_url().as_deref(), Some("http://a/announce"));
        c.report_started();
        assert!(!c.is_ready());
    }

    #[test]
    fn failures_walk_urls_then_tiers() {
        let (mut c, _) = cycle(&[&["http://a1", "http://a2"], &["http://b1"]]);
        c.report_started();
        c.report_failure();
        assert_eq!(c.next_url().as_deref(), Some("http://a2"));
        assert!(c.is_ready(), "failover within a pass is immediate");
        c.report_started();
        c.report_failure();
        assert_eq!(c.next_url().as_deref(), Some("http://b1"));
        assert!(!c.all_tiers_failed_this_pass());
        c.report_started();
        c.report_failure();
        assert!(c.all_tiers_failed_this_pass());
        assert!(!c.is_ready());
        assert_eq!(c.failures(), 3);
    }

    #[test]
    fn reset_returns_to_first_tier_and_waits_for_cooldown() {
        let (mut c, _) = cycle(&[&["http://a"], &["http://b"]]);
        c.report_started();
        c.report_failure();
        c.report_started();
        c.report_failure();
        c.reset_cycle();
        assert_eq!(c.position(), (0, 0));
        assert!(!c.all_tiers_failed_this_pass());
        assert!(!c.is_ready(), "default cooldown has not elapsed");
        assert!(c.is_ready_at(Instant::now() + DEFAULT_ANNOUNCE_INTERVAL));
    }

    #[test]
    fn reset_at_first_tier_is_idempotent() {
        let (fresh, _) = cycle(&[&["http://a", "http://b"]]);
        let fresh = fresh.with_user_interval(Duration::ZERO);
        let (c, _) = cycle(&[&["http://a", "http://b"]]);
        let mut c = c.with_user_interval(Duration::ZERO);
        c.reset_cycle();
        let after_one = (c.position(), c.next_url(), c.is_ready());
        c.reset_cycle();
        let after_two = (c.position(), c.next_url(), c.is_ready());
        assert_eq!(after_one, after_two);
        assert_eq!(after_two, (fresh.position(), fresh.next_url(), fresh.is_ready()));
    }

    #[test]
    fn success_promotes_url_and_starts_new_pass() {
        let (mut c, _) = cycle(&[&["http://a1", "http://a2"]]);
        c.report_started();
        c.report_failure();
        c.report_started();
        c.report_success();
        assert_eq!(c.position(), (0, 0));
        assert_eq!(c.next_url().as_deref(), Some("http://a2"));
        assert_eq!(c.successes(), 1);
        assert!(!c.is_ready());
    }

    #[test]
    fn accepted_response_feeds_pool_and_intervals() {
        let (mut c, store) = cycle(&[&["http://a"]]);
        c.accept_response(b"interval=900;min=60;peer=10.0.0.1:6881;peer=10.0.0.2:6881")
            .unwrap();
        assert_eq!(store.unused_count(), 2);
        assert_eq!(c.interval(), Duration::from_secs(900));
        assert_eq!(c.min_interval(), Duration::from_secs(60));
        assert_eq!(c.cooldown(), Duration::from_secs(60));

        c.accept_response(b"interval=30;min=60").unwrap();
        assert_eq!(c.min_interval(), Duration::from_secs(30), "min interval is capped by interval");

        c.accept_response(b"interval=120").unwrap();
        assert_eq!(c.min_interval(), Duration::from_secs(120));
    }

    #[test]
    fn failure_reason_and_garbage_are_rejected() {
        let (mut c, store) = cycle(&[&["http://a"]]);
        assert_eq!(
            c.accept_response(b"fail=unregistered torrent;peer=10.0.0.1:1"),
            Err(ParseError::Rejected("unregistered torrent".into()))
        );
        assert_eq!(store.unused_count(), 0);
        assert!(matches!(c.accept_response(b"bogus"), Err(ParseError::Malformed(_))));
    }

    #[test]
    fn final_announce_exhausts_permanently() {
        let (mut c, _) = cycle(&[&["http://a"]]);
        c.mark_final();
        c.report_started();
        c.report_failure();
        assert!(!c.permanently_exhausted());
        c.reset_cycle();
        c.report_started();
        c.report_success();
        assert!(c.permanently_exhausted());
    }

    #[test]
    fn user_interval_overrides_tracker_interval() {
        let (c, _) = cycle(&[&["http://a"]]);
        let mut c = c.with_user_interval(Duration::from_secs(5));
        c.report_started();
        c.report_success();
        assert_eq!(c.cooldown(), Duration::from_secs(5));
        assert!(c.is_ready_at(Instant::now() + Duration::from_secs(6)));
    }

    #[test]
    fn configured_interval_is_the_cooldown() {
        let store: Arc<dyn PeerPool> = Arc::new(PeerStore::new());
        let cfg = TrackwatchConfig {
            announce_interval_secs: 120,
            ..TrackwatchConfig::default()
        };
        let c = TieredAnnounce::from_config(&list(&[&["http://a"]]), &cfg, Box::new(KvParser), store.clone());
        assert_eq!(c.cooldown(), Duration::from_secs(120));

        let follow = TieredAnnounce::from_config(
            &list(&[&["http://a"]]),
            &TrackwatchConfig::default(),
            Box::new(KvParser),
            store,
        );
        assert_eq!(follow.cooldown(), follow.min_interval());
        assert_eq!(follow.cooldown(), DEFAULT_ANNOUNCE_INTERVAL);
    }
}
