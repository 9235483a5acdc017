//! Centralized configuration for the launcher core.
//!
//! Compile-time constants live on the `*Config` unit structs. Values a user may
//! change at runtime live in [`LauncherSettings`], which is layered from
//! defaults, an optional JSON file and the environment.

use crate::error::{LauncherError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Where published server binaries come from.
///
/// The version is pinned here and nowhere else. A new server release means a
/// new catalog, never a runtime override.
pub struct ReleaseConfig;

impl ReleaseConfig {
    pub const HOST: &'static str = "https://github.com/chrehall68/vls/releases/download";
    pub const SERVER_VERSION: &'static str = "v0.1.0";
}

/// Development-mode socket defaults.
pub struct DevServerConfig;

impl DevServerConfig {
    pub const DEFAULT_HOST: &'static str = "localhost";
    pub const DEFAULT_PORT: u16 = 60256;
    pub const HOST_ENV: &'static str = "VLS_HOST";
    pub const PORT_ENV: &'static str = "VLS_PORT";
    pub const MODE_ENV: &'static str = "VLS_EXTENSION_MODE";
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const USER_AGENT: &'static str = concat!("vls-client/", env!("CARGO_PKG_VERSION"));
    pub const DOWNLOAD_PROGRESS_INTERVAL: Duration = Duration::from_millis(500);
}

/// Cache layout under the extension's private storage directory.
pub struct PathsConfig;

impl PathsConfig {
    pub const BIN_DIR_NAME: &'static str = "bin";
}

/// Identity the protocol client registers with the editor.
pub struct ClientConfig;

impl ClientConfig {
    pub const CLIENT_ID: &'static str = "verilogLS";
    pub const CLIENT_NAME: &'static str = "Verilog Language Server";
    pub const DOCUMENT_LANGUAGE: &'static str = "verilog";
    pub const DOCUMENT_SCHEME: &'static str = "file";
}

/// Runtime settings for an activation.
///
/// Timeouts are off unless configured: a hung release host or dev server
/// stalls activation, which matches how the editor extension has always
/// behaved.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LauncherSettings {
    /// Host of the externally launched development server.
    pub dev_host: String,
    /// Port of the externally launched development server.
    pub dev_port: u16,
    /// Upper bound on fetching the server binary, in seconds.
    pub download_timeout_secs: Option<u64>,
    /// Upper bound on the development socket connect, in seconds.
    pub connect_timeout_secs: Option<u64>,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            dev_host: DevServerConfig::DEFAULT_HOST.to_string(),
            dev_port: DevServerConfig::DEFAULT_PORT,
            download_timeout_secs: None,
            connect_timeout_secs: None,
        }
    }
}

impl LauncherSettings {
    /// Load settings from a JSON file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| LauncherError::io("Failed to read settings file", path, e))?;
        let settings: Self = serde_json::from_str(&contents)?;
        debug!("Loaded launcher settings from {}", path.display());
        Ok(settings)
    }

    /// Apply `VLS_HOST` / `VLS_PORT` from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(DevServerConfig::HOST_ENV).filter(|h| !h.trim().is_empty()) {
            self.dev_host = host.trim().to_string();
        }

        if let Some(raw) = lookup(DevServerConfig::PORT_ENV) {
            self.dev_port = parse_port(&raw)?;
        }

        Ok(self)
    }

    /// Check the merged settings once every layer has been applied.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_port(self.dev_port) {
            return Err(LauncherError::Config {
                message: format!(
                    "devPort must be a port number between 1 and 65535, got {}",
                    self.dev_port
                ),
            });
        }
        if self.dev_host.trim().is_empty() {
            return Err(LauncherError::Config {
                message: "devHost must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn download_timeout(&self) -> Option<Duration> {
        self.download_timeout_secs.map(Duration::from_secs)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }
}

fn is_valid_port(port: u16) -> bool {
    port != 0
}

fn parse_port(raw: &str) -> Result<u16> {
    match raw.trim().parse::<u16>() {
        Ok(port) if is_valid_port(port) => Ok(port),
        _ => Err(LauncherError::Config {
            message: format!(
                "{} must be a port number between 1 and 65535, got {:?}",
                DevServerConfig::PORT_ENV,
                raw
            ),
        }),
    }
}
