//! Configuration module
//!
//! Handles CLI configuration and turns it into tracker settings.

use std::path::PathBuf;

use anyhow::{Context, Result};
use coursetrack_tracker::TrackerConfig;
use uuid::Uuid;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the job API
    pub api_url: String,
    /// URL of the change feed, if any
    pub realtime_url: Option<String>,
    pub owner_id: Uuid,
    pub marker_path: Option<PathBuf>,
}

impl Config {
    /// Tracker settings, with timing overrides taken from the environment
    pub fn tracker_config(&self) -> Result<TrackerConfig> {
        let mut config = TrackerConfig::new(self.owner_id, self.api_url.clone())
            .with_env_overrides()
            .context("Invalid tracker settings in environment")?;
        config.realtime_url = self.realtime_url.clone();
        config.marker_path = self.marker_path.clone();
        Ok(config)
    }
}
