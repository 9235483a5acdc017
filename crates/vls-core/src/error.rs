//! Error types for the launcher core.
//!
//! Every failure raised while locating, preparing or connecting to the
//! language server is a [`LauncherError`]. None of them are retried or
//! swallowed inside the core; they all surface at the activation boundary.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the launcher core.
#[derive(Debug, Error)]
pub enum LauncherError {
    // Catalog errors
    #[error("Unsupported platform: {os} (no server binary is published for it)")]
    UnsupportedPlatform { os: String },

    // Network errors
    #[error("Network error fetching {url}: {message}")]
    Network {
        url: String,
        message: String,
        /// HTTP status, when the server answered with a non-success code.
        status: Option<u16>,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("{operation} of {target} timed out after {after:?}")]
    Timeout {
        operation: TimedOut,
        target: String,
        after: Duration,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Transport errors
    #[error("Failed to connect to language server at {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn language server {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for launcher operations.
pub type Result<T> = std::result::Result<T, LauncherError>;

/// Which bounded operation ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimedOut {
    Download,
    Connect,
}

impl std::fmt::Display for TimedOut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimedOut::Download => f.write_str("Download"),
            TimedOut::Connect => f.write_str("Connect"),
        }
    }
}

/// Coarse failure category, as reported to the editor host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnsupportedPlatform,
    NetworkFailure,
    FileSystemError,
    ConnectFailure,
    SpawnFailure,
    Configuration,
}

impl From<std::io::Error> for LauncherError {
    fn from(err: std::io::Error) -> Self {
        LauncherError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for LauncherError {
    fn from(err: serde_json::Error) -> Self {
        LauncherError::Config {
            message: format!("invalid settings file: {}", err),
        }
    }
}

impl From<reqwest::Error> for LauncherError {
    fn from(err: reqwest::Error) -> Self {
        LauncherError::Network {
            url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            message: err.to_string(),
            status: err.status().map(|s| s.as_u16()),
            source: Some(err),
        }
    }
}

impl LauncherError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        LauncherError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create an IO error with a custom message and path context.
    pub fn io(message: impl Into<String>, path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        LauncherError::Io {
            message: format!("{}: {}", message.into(), err),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Map this error onto the failure taxonomy.
    ///
    /// Timeouts only occur on fetches or connects when a timeout has been
    /// configured, and they are classified with the operation they cut short.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LauncherError::UnsupportedPlatform { .. } => ErrorKind::UnsupportedPlatform,
            LauncherError::Network { .. } => ErrorKind::NetworkFailure,
            LauncherError::Timeout {
                operation: TimedOut::Connect,
                ..
            } => ErrorKind::ConnectFailure,
            LauncherError::Timeout {
                operation: TimedOut::Download,
                ..
            } => ErrorKind::NetworkFailure,
            LauncherError::Io { .. } => ErrorKind::FileSystemError,
            LauncherError::Connect { .. } => ErrorKind::ConnectFailure,
            LauncherError::Spawn { .. } => ErrorKind::SpawnFailure,
            LauncherError::Config { .. } => ErrorKind::Configuration,
        }
    }

    /// Whether the IO error underneath is "file already exists".
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            LauncherError::Io { source: Some(e), .. } if e.kind() == std::io::ErrorKind::AlreadyExists
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LauncherError::UnsupportedPlatform {
            os: "freebsd".into(),
        };
        assert_eq!(
            err.to_string(),
            "Unsupported platform: freebsd (no server binary is published for it)"
        );
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            LauncherError::UnsupportedPlatform { os: "plan9".into() }.kind(),
            ErrorKind::UnsupportedPlatform
        );
        assert_eq!(
            LauncherError::Network {
                url: "http://x".into(),
                message: "refused".into(),
                status: None,
                source: None,
            }
            .kind(),
            ErrorKind::NetworkFailure
        );
        assert_eq!(
            LauncherError::Spawn {
                path: "/nope".into(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }
            .kind(),
            ErrorKind::SpawnFailure
        );
        assert_eq!(
            LauncherError::Timeout {
                operation: TimedOut::Connect,
                target: "localhost:60256".into(),
                after: Duration::from_secs(1),
            }
            .kind(),
            ErrorKind::ConnectFailure
        );
        assert_eq!(
            LauncherError::Timeout {
                operation: TimedOut::Download,
                target: "connect.example/vls".into(),
                after: Duration::from_secs(1),
            }
            .kind(),
            ErrorKind::NetworkFailure
        );
    }

    #[test]
    fn test_timeout_display() {
        let err = LauncherError::Timeout {
            operation: TimedOut::Connect,
            target: "localhost:60256".into(),
            after: Duration::from_secs(2),
        };
        assert_eq!(err.to_string(), "Connect of localhost:60256 timed out after 2s");
    }

    #[test]
    fn test_already_exists_detection() {
        let err = LauncherError::io_with_path(
            std::io::Error::from(std::io::ErrorKind::AlreadyExists),
            "/tmp/vls",
        );
        assert!(err.is_already_exists());
        assert_eq!(err.kind(), ErrorKind::FileSystemError);

        let err: LauncherError = std::io::Error::from(std::io::ErrorKind::NotFound).into();
        assert!(!err.is_already_exists());
    }
}
