//! Runtime configuration for the scheduler
//!
//! Defaults come from [`crate::constants`]. Production code normally uses
//! `SchedulerConfig::from_env()`; tests shrink windows and timeouts through
//! the `with_*` builders.

use crate::constants::{
    API_URL_ENV, CACHE_TTL_SECS, COINGECKO_API_URL, MAX_REQUESTS_PER_WINDOW,
    MIN_REQUEST_INTERVAL_MS, RATE_LIMIT_PENALTY_MS, RATE_WINDOW_SECS, REQUEST_TIMEOUT_ENV,
    REQUEST_TIMEOUT_SECS, USER_AGENT,
};
use std::time::Duration;

/// Rate budget enforced by the governor
#[derive(Debug, Clone, PartialEq)]
pub struct RateBudget {
    /// Minimum spacing between two admitted calls
    pub min_interval: Duration,
    /// Maximum admitted calls per window
    pub max_per_window: u32,
    /// Length of the accounting window
    pub window: Duration,
    /// Extra suspension after a provider-signalled rate limit
    pub penalty: Duration,
}

impl Default for RateBudget {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(MIN_REQUEST_INTERVAL_MS),
            max_per_window: MAX_REQUESTS_PER_WINDOW,
            window: Duration::from_secs(RATE_WINDOW_SECS),
            penalty: Duration::from_millis(RATE_LIMIT_PENALTY_MS),
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Provider base URL
    pub api_url: String,
    /// User agent sent with every request
    pub user_agent: String,
    /// Bound on a single provider call
    pub request_timeout: Duration,
    /// Freshness of cached responses
    pub cache_ttl: Duration,
    /// Provider rate budget
    pub rate: RateBudget,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            api_url: COINGECKO_API_URL.to_string(),
            user_agent: USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            cache_ttl: Duration::from_secs(CACHE_TTL_SECS),
            rate: RateBudget::default(),
        }
    }
}

impl SchedulerConfig {
    /// Builds the default configuration with environment overrides applied
    ///
    /// Reads `MARKET_DATA_API_URL` and `MARKET_DATA_REQUEST_TIMEOUT_SECS`.
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                config.api_url = url.trim().trim_end_matches('/').to_string();
            }
        }

        if let Ok(raw) = std::env::var(REQUEST_TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.request_timeout = Duration::from_secs(secs),
                _ => tracing::warn!(
                    variable = REQUEST_TIMEOUT_ENV,
                    value = %raw,
                    "Ignoring invalid request timeout override"
                ),
            }
        }

        config
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_rate_budget(mut self, rate: RateBudget) -> Self {
        self.rate = rate;
        self
    }
}
