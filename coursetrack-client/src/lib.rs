//! Coursetrack Client
//!
//! Type-safe clients for the course-generation pipeline's job API.
//!
//! Two transports are provided:
//! - [`PipelineClient`]: HTTP pull endpoint and job control endpoints
//!   (resume, restart, delete, clear)
//! - [`RealtimeSocket`]: WebSocket change feed filtered to one owner's jobs
//!
//! # Example
//!
//! ```no_run
//! use coursetrack_client::PipelineClient;
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() -> coursetrack_client::Result<()> {
//!     let client = PipelineClient::new("http://localhost:8080");
//!
//!     let jobs = client.list_jobs(Uuid::new_v4()).await?;
//!     println!("Tracking {} job(s)", jobs.len());
//!     Ok(())
//! }
//! ```

pub mod error;
mod jobs;
pub mod realtime;

pub use error::{ClientError, Result};
pub use realtime::{FeedMessage, FeedSubscription, RealtimeSocket};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the generation pipeline's job API
///
/// Covers the two groups of endpoints the tracker consumes:
/// - Pull: list an owner's non-cleared jobs
/// - Control: resume, restart, delete and clear a job
#[derive(Debug, Clone)]
pub struct PipelineClient {
    /// Base URL of the API (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl PipelineClient {
    /// Create a new pipeline client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the job API (e.g., "http://localhost:8080")
    ///
    /// # Example
    /// ```
    /// use coursetrack_client::PipelineClient;
    ///
    /// let client = PipelineClient::new("http://localhost:8080");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new pipeline client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    ///
    /// # Example
    /// ```
    /// use coursetrack_client::PipelineClient;
    /// use reqwest::Client;
    /// use std::time::Duration;
    ///
    /// let http_client = Client::builder()
    ///     .timeout(Duration::from_secs(30))
    ///     .build()
    ///     .unwrap();
    ///
    /// let client = PipelineClient::with_client("http://localhost:8080", http_client);
    /// ```
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the job API
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// This method checks the status code and returns an appropriate error if
    /// the request failed, or deserializes the response body if successful.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = PipelineClient::new("http://localhost:8080");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = PipelineClient::new("http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_client_with_custom_client() {
        let http_client = Client::new();
        let client = PipelineClient::with_client("http://localhost:8080", http_client);
        assert_eq!(client.base_url(), "http://localhost:8080");
    }
}
