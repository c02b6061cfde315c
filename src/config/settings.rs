//! Native host settings
//!
//! Built from constants, then environment overrides, then CLI flags.
//! Out-of-range values are clamped with a warning rather than rejected.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{error, warn};

use crate::config::store::JsonFileStore;
use crate::constants::{delivery, env as env_vars, persistence};

#[derive(Debug, Clone, PartialEq)]
pub struct HostSettings {
    /// Delays after the first direct insertion at which it is reissued
    pub retry_delays: Vec<Duration>,
    /// Idle window before a pushed schema is persisted
    pub debounce: Duration,
    pub store_path: PathBuf,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            retry_delays: delivery::RETRY_DELAYS_MS
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
            debounce: Duration::from_millis(persistence::DEBOUNCE_MS),
            store_path: JsonFileStore::default_path(),
        }
    }
}

impl HostSettings {
    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Ok(raw) = env::var(env_vars::RETRY_MS) {
            match parse_delays(&raw) {
                Some(delays) => settings.retry_delays = delays,
                None => error!(var = env_vars::RETRY_MS, value = %raw, "failed to parse env var"),
            }
        }
        if let Ok(raw) = env::var(env_vars::DEBOUNCE_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => settings.debounce = Duration::from_millis(ms),
                Err(e) => error!(var = env_vars::DEBOUNCE_MS, error = ?e, "failed to parse env var"),
            }
        }
        settings.validate_and_clamp();
        settings
    }

    /// Clamp values to safe ranges
    pub fn validate_and_clamp(&mut self) {
        let max_delay = Duration::from_millis(delivery::MAX_RETRY_DELAY_MS);

        if self.retry_delays.len() > delivery::MAX_RETRIES {
            warn!(count = self.retry_delays.len(), max = delivery::MAX_RETRIES, "too many retry delays, truncating");
            self.retry_delays.truncate(delivery::MAX_RETRIES);
        }
        for delay in &mut self.retry_delays {
            if *delay > max_delay {
                warn!(delay_ms = delay.as_millis() as u64, max = delivery::MAX_RETRY_DELAY_MS, "retry delay exceeds maximum, clamping");
                *delay = max_delay;
            }
        }
        self.retry_delays.sort();

        let min = Duration::from_millis(persistence::MIN_DEBOUNCE_MS);
        let max = Duration::from_millis(persistence::MAX_DEBOUNCE_MS);
        if self.debounce < min {
            warn!(debounce_ms = self.debounce.as_millis() as u64, min = persistence::MIN_DEBOUNCE_MS, "debounce below minimum, clamping");
            self.debounce = min;
        } else if self.debounce > max {
            warn!(debounce_ms = self.debounce.as_millis() as u64, max = persistence::MAX_DEBOUNCE_MS, "debounce exceeds maximum, clamping");
            self.debounce = max;
        }
    }
}

/// `"1500,3000"` -> [1.5s, 3s]; an empty string disables retries
fn parse_delays(raw: &str) -> Option<Vec<Duration>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u64>().ok().map(Duration::from_millis))
        .collect()
}
