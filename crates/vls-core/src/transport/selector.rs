//! Picks how to reach the server for the current run mode.

use super::mode::RunMode;
use crate::config::LauncherSettings;
use crate::error::Result;
use crate::platform::PlatformCatalog;
use crate::resolver::{ArtifactFetcher, ExecutableResolver, PermissionFixer};
use std::fmt;
use std::path::PathBuf;
use tracing::info;

/// The single decision of how the channel will be established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportStrategy {
    /// Connect to an already running server over TCP.
    Socket { host: String, port: u16 },
    /// Spawn the server with no arguments and talk over its stdio.
    Spawn { path: PathBuf },
}

impl fmt::Display for TransportStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportStrategy::Socket { host, port } => write!(f, "socket {}:{}", host, port),
            TransportStrategy::Spawn { path } => write!(f, "spawn {}", path.display()),
        }
    }
}

/// Turns the run mode into a [`TransportStrategy`].
#[derive(Debug, Clone, Copy)]
pub struct TransportSelector {
    mode: RunMode,
}

impl TransportSelector {
    pub fn new(mode: RunMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Decide the transport.
    ///
    /// Development mode never touches the catalog, the cache or the network.
    /// Production mode looks up `os_id` before anything else, so an
    /// unsupported platform fails without side effects.
    pub async fn select<F, P>(
        &self,
        settings: &LauncherSettings,
        catalog: &PlatformCatalog,
        os_id: &str,
        resolver: &ExecutableResolver<F, P>,
    ) -> Result<TransportStrategy>
    where
        F: ArtifactFetcher,
        P: PermissionFixer,
    {
        let strategy = match self.mode {
            RunMode::Development => TransportStrategy::Socket {
                host: settings.dev_host.clone(),
                port: settings.dev_port,
            },
            RunMode::Production => {
                let descriptor = catalog.descriptor_for(os_id)?;
                let resolved = resolver.resolve(descriptor).await?;
                TransportStrategy::Spawn {
                    path: resolved.path,
                }
            }
        };

        info!("Run mode {}, transport: {}", self.mode, strategy);
        Ok(strategy)
    }
}
