//! Tracker configuration
//!
//! Defines every tunable of a tracking session: endpoints, polling and
//! reconnect timings, health thresholds and where notification markers are
//! persisted.

use std::path::PathBuf;
use std::time::Duration;

use uuid::Uuid;

use crate::error::ConfigError;
use crate::health::HealthPolicy;

/// Tracking session configuration
///
/// All timings are configurable so tests and slow networks can tune them;
/// the defaults are the canonical policy.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// User whose jobs are tracked; every fetch and subscription is scoped to it
    pub owner_id: Uuid,

    /// Job API base URL (e.g., "http://localhost:8080")
    pub api_url: String,

    /// Change-feed URL; `None` runs the session in poll-only mode
    pub realtime_url: Option<String>,

    /// How often the fallback poller fetches the job list
    pub poll_interval: Duration,

    /// Reconnect attempts after a channel failure before falling back to polling
    pub max_retries: u32,

    /// First reconnect delay; doubles per attempt
    pub backoff_base: Duration,

    /// Upper bound for the reconnect delay
    pub backoff_cap: Duration,

    /// How long opening a channel, and then confirming its subscription, may each take
    pub subscribe_timeout: Duration,

    /// Pause between exhausted retry cycles before probing the feed again
    pub resubscribe_interval: Duration,

    /// Consecutive fetch failures before the fetch-failed banner is raised
    pub fetch_failure_threshold: u32,

    /// File holding notification markers; `None` keeps them in memory
    pub marker_path: Option<PathBuf>,

    /// Staleness thresholds and completion cutoffs
    pub health: HealthPolicy,
}

impl TrackerConfig {
    /// Creates a configuration with defaults for the given owner
    pub fn new(owner_id: Uuid, api_url: String) -> Self {
        Self {
            owner_id,
            api_url,
            realtime_url: None,
            poll_interval: Duration::from_secs(3),
            max_retries: 3,
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(10),
            subscribe_timeout: Duration::from_secs(10),
            resubscribe_interval: Duration::from_secs(30),
            fetch_failure_threshold: 2,
            marker_path: None,
            health: HealthPolicy::default(),
        }
    }

    /// Applies timing overrides from environment variables
    ///
    /// Recognized environment variables:
    /// - COURSETRACK_POLL_INTERVAL_SECS (default: 3)
    /// - COURSETRACK_MAX_RETRIES (default: 3)
    /// - COURSETRACK_SUBSCRIBE_TIMEOUT_SECS (default: 10)
    /// - COURSETRACK_RESUBSCRIBE_INTERVAL_SECS (default: 30)
    ///
    /// Endpoints, owner and marker path are passed in by the caller.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(raw) = lookup("COURSETRACK_POLL_INTERVAL_SECS") {
            self.poll_interval = Duration::from_secs(parse_u64("poll_interval", &raw)?);
        }

        if let Some(raw) = lookup("COURSETRACK_MAX_RETRIES") {
            let retries = parse_u64("max_retries", &raw)?;
            self.max_retries = u32::try_from(retries)
                .map_err(|_| ConfigError::invalid("max_retries", format!("{} is too large", retries)))?;
        }

        if let Some(raw) = lookup("COURSETRACK_SUBSCRIBE_TIMEOUT_SECS") {
            self.subscribe_timeout = Duration::from_secs(parse_u64("subscribe_timeout", &raw)?);
        }

        if let Some(raw) = lookup("COURSETRACK_RESUBSCRIBE_INTERVAL_SECS") {
            self.resubscribe_interval =
                Duration::from_secs(parse_u64("resubscribe_interval", &raw)?);
        }

        Ok(self)
    }

    /// Sets the change-feed URL
    pub fn with_realtime_url(mut self, url: impl Into<String>) -> Self {
        self.realtime_url = Some(url.into());
        self
    }

    /// Sets the marker file
    pub fn with_marker_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.marker_path = Some(path.into());
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_url.is_empty() {
            return Err(ConfigError::invalid("api_url", "cannot be empty"));
        }

        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(ConfigError::invalid(
                "api_url",
                "must start with http:// or https://",
            ));
        }

        if let Some(url) = &self.realtime_url {
            if !url.starts_with("ws://") && !url.starts_with("wss://") {
                return Err(ConfigError::invalid(
                    "realtime_url",
                    "must start with ws:// or wss://",
                ));
            }
        }

        if self.poll_interval.is_zero() {
            return Err(ConfigError::invalid(
                "poll_interval",
                "must be greater than 0",
            ));
        }

        if self.backoff_base.is_zero() {
            return Err(ConfigError::invalid(
                "backoff_base",
                "must be greater than 0",
            ));
        }

        if self.backoff_cap < self.backoff_base {
            return Err(ConfigError::invalid(
                "backoff_cap",
                "must not be smaller than backoff_base",
            ));
        }

        if self.fetch_failure_threshold == 0 {
            return Err(ConfigError::invalid(
                "fetch_failure_threshold",
                "must be greater than 0",
            ));
        }

        self.health.validate()
    }
}

fn parse_u64(field: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::invalid(field, format!("'{}': {}", raw, e)))
}
