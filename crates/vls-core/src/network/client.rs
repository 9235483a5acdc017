//! Thin wrapper around `reqwest` used for release downloads.

use crate::config::NetworkConfig;
use crate::{LauncherError, Result};
use reqwest::{Client, Response};
use tracing::debug;

/// HTTP client with the launcher's user agent.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration.
    ///
    /// No request timeout is installed; callers bound the whole transfer
    /// when a limit is configured.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| LauncherError::Network {
                url: String::new(),
                message: format!("Failed to create HTTP client: {}", e),
                status: None,
                source: Some(e),
            })?;

        Ok(Self { client })
    }

    /// Issue a GET and reject non-success statuses.
    pub async fn get_success(&self, url: &str) -> Result<Response> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LauncherError::Network {
                url: url.to_string(),
                message: format!("Request failed: {}", e),
                status: None,
                source: Some(e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::Network {
                url: url.to_string(),
                message: format!("Server responded with status {}", status),
                status: Some(status.as_u16()),
                source: None,
            });
        }

        Ok(response)
    }
}
