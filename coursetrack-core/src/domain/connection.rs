//! Connection state shown to the user

use serde::{Deserialize, Serialize};

/// How job updates are currently reaching the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Push channel subscribed and delivering events
    Connected,
    /// Push channel not confirmed yet, or failing and being retried
    Degraded,
    /// Push retries exhausted; updates arrive through fallback polling
    Polling,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Degraded => write!(f, "degraded"),
            ConnectionStatus::Polling => write!(f, "polling"),
        }
    }
}
