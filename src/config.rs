//! Runtime configuration, read once at startup.
//!
//! Everything here is plain data: the poller loop receives an immutable
//! [`FeedConfig`] and never consults the environment again.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Base poll interval when `POLL_SEC` is not set.
pub const DEFAULT_POLL_SECS: u64 = 12;

/// Trip updates are heavier payloads; never poll them faster than this.
const TRIPS_FLOOR_SECS: u64 = 8;

/// Alerts change rarely; fixed cadence regardless of the base interval.
const ALERTS_SECS: u64 = 15;

const DEFAULT_NAMESPACE: &str = "mtw";

/// The three feeds the daemon ingests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    Vehicles,
    Trips,
    Alerts,
}

impl FeedKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedKind::Vehicles => "vehicles",
            FeedKind::Trips => "trips",
            FeedKind::Alerts => "alerts",
        }
    }

    /// Environment variable carrying this feed's endpoint URL.
    fn url_var(self) -> &'static str {
        match self {
            FeedKind::Vehicles => "VEH_URL",
            FeedKind::Trips => "TRIP_URL",
            FeedKind::Alerts => "ALERT_URL",
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One feed's polling schedule, fixed for the process lifetime.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub kind: FeedKind,
    pub url: String,
    pub poll_interval: Duration,
    /// Offset before the first fetch, so the three feeds never hit the
    /// upstream at the same instant.
    pub initial_delay: Duration,
    pub cache_key: String,
}

/// Process-wide settings. Missing required values are the one fatal error
/// class in this daemon; everything after startup degrades per cycle instead.
#[derive(Debug, Clone)]
pub struct Settings {
    pub redis_url: String,
    pub namespace: String,
    pub poll_secs: u64,
    pub vehicles_url: String,
    pub trips_url: String,
    pub alerts_url: String,
}

impl Settings {
    /// Reads settings from the process environment. `.env` loading is the
    /// caller's job and must happen first.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |key: &str| -> Result<String> {
            match get(key) {
                Some(v) if !v.trim().is_empty() => Ok(v),
                _ => bail!("required environment variable {key} is not set"),
            }
        };

        let redis_url = require("REDIS_URL")?;
        let vehicles_url = require(FeedKind::Vehicles.url_var())?;
        let trips_url = require(FeedKind::Trips.url_var())?;
        let alerts_url = require(FeedKind::Alerts.url_var())?;

        let poll_secs = match get("POLL_SEC") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("POLL_SEC is not a valid integer: {raw:?}"))?,
            None => DEFAULT_POLL_SECS,
        };
        if poll_secs == 0 {
            bail!("POLL_SEC must be at least 1");
        }

        let namespace = get("CACHE_NAMESPACE")
            .filter(|ns| !ns.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

        Ok(Settings {
            redis_url,
            namespace,
            poll_secs,
            vehicles_url,
            trips_url,
            alerts_url,
        })
    }

    /// Applies command line overrides on top of the environment values. A
    /// blank namespace is ignored, same as a blank `CACHE_NAMESPACE`.
    pub fn apply_overrides(
        &mut self,
        poll_secs: Option<u64>,
        namespace: Option<String>,
    ) -> Result<()> {
        if let Some(poll) = poll_secs {
            if poll == 0 {
                bail!("--poll-sec must be at least 1");
            }
            self.poll_secs = poll;
        }
        if let Some(ns) = namespace.filter(|ns| !ns.trim().is_empty()) {
            self.namespace = ns;
        }
        Ok(())
    }

    /// Derives the per-feed schedule: vehicles at the base interval, trips at
    /// the base but never below the floor, alerts on their own fixed cadence.
    /// Stagger offsets are fixed per feed.
    pub fn feeds(&self) -> Vec<FeedConfig> {
        [
            (FeedKind::Vehicles, &self.vehicles_url, self.poll_secs, 0),
            (
                FeedKind::Trips,
                &self.trips_url,
                self.poll_secs.max(TRIPS_FLOOR_SECS),
                4,
            ),
            (FeedKind::Alerts, &self.alerts_url, ALERTS_SECS, 6),
        ]
        .into_iter()
        .map(|(kind, url, interval_secs, delay_secs)| FeedConfig {
            kind,
            url: url.clone(),
            poll_interval: Duration::from_secs(interval_secs),
            initial_delay: Duration::from_secs(delay_secs),
            cache_key: format!("{}:{}", self.namespace, kind.as_str()),
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: Vec<(&'static str, &'static str)>) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    fn required_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            ("REDIS_URL", "redis://localhost:6379"),
            ("VEH_URL", "http://feeds.test/vehicles.pb"),
            ("TRIP_URL", "http://feeds.test/trips.pb"),
            ("ALERT_URL", "http://feeds.test/alerts.pb"),
        ]
    }

    #[test]
    fn test_defaults_when_only_required_vars_set() {
        let settings = Settings::from_lookup(lookup(required_vars())).unwrap();

        assert_eq!(settings.poll_secs, 12);
        assert_eq!(settings.namespace, "mtw");

        let feeds = settings.feeds();
        assert_eq!(feeds.len(), 3);

        let intervals: Vec<u64> = feeds.iter().map(|f| f.poll_interval.as_secs()).collect();
        let delays: Vec<u64> = feeds.iter().map(|f| f.initial_delay.as_secs()).collect();
        assert_eq!(intervals, vec![12, 12, 15]);
        assert_eq!(delays, vec![0, 4, 6]);

        let keys: Vec<&str> = feeds.iter().map(|f| f.cache_key.as_str()).collect();
        assert_eq!(keys, vec!["mtw:vehicles", "mtw:trips", "mtw:alerts"]);
    }

    #[test]
    fn test_trips_interval_never_drops_below_floor() {
        let mut vars = required_vars();
        vars.push(("POLL_SEC", "6"));
        let settings = Settings::from_lookup(lookup(vars)).unwrap();

        let feeds = settings.feeds();
        assert_eq!(feeds[0].poll_interval.as_secs(), 6); // vehicles track the base
        assert_eq!(feeds[1].poll_interval.as_secs(), 8); // trips hit the floor
        assert_eq!(feeds[2].poll_interval.as_secs(), 15); // alerts unaffected
    }

    #[test]
    fn test_trips_follow_base_above_floor() {
        let mut vars = required_vars();
        vars.push(("POLL_SEC", "20"));
        let settings = Settings::from_lookup(lookup(vars)).unwrap();

        assert_eq!(settings.feeds()[1].poll_interval.as_secs(), 20);
    }

    #[test]
    fn test_missing_redis_url_is_an_error() {
        let vars = required_vars()
            .into_iter()
            .filter(|(k, _)| *k != "REDIS_URL")
            .collect();
        let err = Settings::from_lookup(lookup(vars)).unwrap_err();

        assert!(err.to_string().contains("REDIS_URL"));
    }

    #[test]
    fn test_missing_feed_url_names_the_variable() {
        let vars = required_vars()
            .into_iter()
            .filter(|(k, _)| *k != "ALERT_URL")
            .collect();
        let err = Settings::from_lookup(lookup(vars)).unwrap_err();

        assert!(err.to_string().contains("ALERT_URL"));
    }

    #[test]
    fn test_unparsable_poll_interval_is_an_error() {
        let mut vars = required_vars();
        vars.push(("POLL_SEC", "soon"));
        assert!(Settings::from_lookup(lookup(vars)).is_err());
    }

    #[test]
    fn test_zero_poll_interval_is_an_error() {
        let mut vars = required_vars();
        vars.push(("POLL_SEC", "0"));
        assert!(Settings::from_lookup(lookup(vars)).is_err());
    }

    #[test]
    fn test_namespace_scopes_cache_keys() {
        let mut vars = required_vars();
        vars.push(("CACHE_NAMESPACE", "mtw:saskatoon"));
        let settings = Settings::from_lookup(lookup(vars)).unwrap();

        assert_eq!(settings.feeds()[0].cache_key, "mtw:saskatoon:vehicles");
    }

    #[test]
    fn test_blank_namespace_falls_back_to_default() {
        let mut vars = required_vars();
        vars.push(("CACHE_NAMESPACE", "  "));
        let settings = Settings::from_lookup(lookup(vars)).unwrap();

        assert_eq!(settings.namespace, "mtw");
    }

    #[test]
    fn test_overrides_replace_environment_values() {
        let mut settings = Settings::from_lookup(lookup(required_vars())).unwrap();
        settings
            .apply_overrides(Some(30), Some("mtw:regina".to_string()))
            .unwrap();

        assert_eq!(settings.poll_secs, 30);
        assert_eq!(settings.feeds()[0].cache_key, "mtw:regina:vehicles");
    }

    #[test]
    fn test_blank_namespace_override_keeps_the_configured_one() {
        let mut vars = required_vars();
        vars.push(("CACHE_NAMESPACE", "mtw:saskatoon"));
        let mut settings = Settings::from_lookup(lookup(vars)).unwrap();
        settings.apply_overrides(None, Some("  ".to_string())).unwrap();

        assert_eq!(settings.namespace, "mtw:saskatoon");
        assert_eq!(settings.feeds()[0].cache_key, "mtw:saskatoon:vehicles");
    }

    #[test]
    fn test_zero_poll_override_is_an_error() {
        let mut settings = Settings::from_lookup(lookup(required_vars())).unwrap();

        assert!(settings.apply_overrides(Some(0), None).is_err());
        assert_eq!(settings.poll_secs, 12); // unchanged on rejection
    }
}
