/// Runtime configuration, layered from defaults, an optional JSON file and
/// `SEATWATCH_*` environment variables
use crate::api::DEFAULT_API_URL;
use crate::poll::RefreshInterval;
use figment::providers::{Env, Format, Json, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix of environment variables that override configuration keys.
pub const ENV_PREFIX: &str = "SEATWATCH_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Origin of the backend, e.g. `http://localhost:8000`
    pub api_url: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Cadence of the course list poll
    pub refresh_interval: RefreshInterval,
    /// Cadence of the single course poll in the details view
    pub details_refresh_interval: RefreshInterval,
    pub stats_interval_secs: u64,
    /// How long a fetched alert list is served from cache
    pub alert_cache_ttl_secs: u64,
    pub search_debounce_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: 10,
            connect_timeout_secs: 5,
            refresh_interval: RefreshInterval::ThirtySeconds,
            details_refresh_interval: RefreshInterval::ThirtySeconds,
            stats_interval_secs: 60,
            alert_cache_ttl_secs: 2 * 60,
            search_debounce_ms: 300,
        }
    }
}

impl Config {
    /// Loads configuration. Later sources win: defaults, then `file` (if
    /// given), then the environment.
    pub fn load(file: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = file {
            figment = figment.merge(Json::file(path));
        }
        let config: Config = figment.merge(Env::prefixed(ENV_PREFIX)).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects zero durations, which would stall requests or spin timers.
    pub fn validate(&self) -> Result<(), figment::Error> {
        let durations = [
            ("request_timeout_secs", self.request_timeout_secs),
            ("connect_timeout_secs", self.connect_timeout_secs),
            ("stats_interval_secs", self.stats_interval_secs),
            ("alert_cache_ttl_secs", self.alert_cache_ttl_secs),
            ("search_debounce_ms", self.search_debounce_ms),
        ];
        match durations.iter().find(|(_, value)| *value == 0) {
            Some((key, _)) => Err(figment::Error::from(format!("{key} must be greater than 0"))),
            None => Ok(()),
        }
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }

    pub fn alert_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.alert_cache_ttl_secs)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}
