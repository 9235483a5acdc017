//! Run mode of the hosting extension.

use crate::config::DevServerConfig;
use crate::error::{LauncherError, Result};
use std::fmt;
use std::str::FromStr;

/// Whether the server is reached over a debug socket or spawned locally.
///
/// Read once from the host at activation and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// The server was started separately (typically under a debugger).
    Development,
    /// The server binary is resolved from the cache and spawned.
    Production,
}

impl RunMode {
    /// Read the mode from `VLS_EXTENSION_MODE`, if set.
    pub fn from_env() -> Result<Option<Self>> {
        std::env::var(DevServerConfig::MODE_ENV)
            .ok()
            .map(|raw| raw.parse())
            .transpose()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Development => "development",
            RunMode::Production => "production",
        }
    }
}

impl FromStr for RunMode {
    type Err = LauncherError;

    /// Accepts the editor's extension-mode names or their numeric values.
    ///
    /// Test mode runs against a spawned server like production; only
    /// development attaches to an externally launched one.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "2" => Ok(RunMode::Development),
            "production" | "prod" | "1" | "test" | "3" => Ok(RunMode::Production),
            other => Err(LauncherError::Config {
                message: format!("unknown extension mode {:?}", other),
            }),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
