//! One activation of the editor plugin: transport decision, channel, client.
//!
//! An [`Activation`] owns the protocol client and the connection it talks
//! over. [`Activation::deactivate`] consumes it, so teardown runs at most once.

use crate::config::LauncherSettings;
use crate::error::{LauncherError, Result};
use crate::network::BinaryDownloader;
use crate::platform::{self, PlatformCatalog};
use crate::resolver::{ArtifactFetcher, ExecutableResolver};
use crate::transport::{
    ConnectionFactory, RunMode, ServerChannel, ServerConnection, TransportSelector,
    TransportStrategy,
};
use std::path::PathBuf;
use tracing::{info, warn};

/// Speaks the analysis protocol over the channel. Implemented outside the core.
#[async_trait::async_trait]
pub trait ProtocolClient: Send {
    /// Take ownership of the channel and begin serving.
    async fn start(&mut self, channel: ServerChannel) -> Result<()>;

    /// Stop serving and release the channel.
    async fn stop(&mut self) -> Result<()>;
}

/// What the editor host tells the plugin at activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionContext {
    /// The extension's private storage root; binaries are cached under `bin/`.
    pub storage_dir: PathBuf,
    pub mode: RunMode,
}

impl ExtensionContext {
    pub fn new(storage_dir: impl Into<PathBuf>, mode: RunMode) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            mode,
        }
    }
}

/// A running activation.
pub struct Activation<C: ProtocolClient> {
    client: C,
    connection: Option<ServerConnection>,
    strategy: TransportStrategy,
}

impl<C: ProtocolClient> Activation<C> {
    /// Activate against the pinned release catalog for this host.
    pub async fn activate(
        ctx: &ExtensionContext,
        settings: &LauncherSettings,
        client: C,
    ) -> Result<Self> {
        let downloader = BinaryDownloader::new()?.with_timeout(settings.download_timeout());
        Self::activate_with(ctx, settings, PlatformCatalog::pinned(), downloader, client).await
    }

    /// Activate with an explicit catalog and artifact source.
    ///
    /// Every failure propagates; on error nothing is left running.
    pub async fn activate_with<F: ArtifactFetcher>(
        ctx: &ExtensionContext,
        settings: &LauncherSettings,
        catalog: &PlatformCatalog,
        fetcher: F,
        mut client: C,
    ) -> Result<Self> {
        info!(
            "Activating in {} mode (storage {})",
            ctx.mode,
            ctx.storage_dir.display()
        );

        let resolver = ExecutableResolver::new(&ctx.storage_dir, fetcher)?;
        let strategy = TransportSelector::new(ctx.mode)
            .select(settings, catalog, platform::current_os_id(), &resolver)
            .await?;

        let mut connection = ConnectionFactory::from_settings(settings)
            .connect(&strategy)
            .await?;
        let channel = connection.take_channel().ok_or_else(|| LauncherError::Config {
            message: "connection produced no channel".to_string(),
        })?;

        if let Err(e) = client.start(channel).await {
            if let Err(shutdown_err) = connection.shutdown().await {
                warn!("Failed to tear down connection after client error: {}", shutdown_err);
            }
            return Err(e);
        }

        Ok(Self {
            client,
            connection: Some(connection),
            strategy,
        })
    }

    pub fn strategy(&self) -> &TransportStrategy {
        &self.strategy
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    /// Stop the client, then close the socket or kill the server process.
    ///
    /// Both steps always run; the first error is returned.
    pub async fn deactivate(mut self) -> Result<()> {
        info!("Deactivating ({})", self.strategy);
        let stopped = self.client.stop().await;

        let closed = match self.connection.take() {
            Some(connection) => connection.shutdown().await,
            None => Ok(()),
        };

        stopped.and(closed)
    }
}

impl<C: ProtocolClient> Drop for Activation<C> {
    fn drop(&mut self) {
        if self.connection.is_some() {
            warn!(
                "Activation dropped without deactivate; {} is torn down on drop",
                self.strategy
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::platform::PlatformDescriptor;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[derive(Default, Clone)]
    struct Counters {
        started: Arc<AtomicUsize>,
        stopped: Arc<AtomicUsize>,
    }

    struct HoldingClient {
        counters: Counters,
        channel: Option<ServerChannel>,
    }

    impl HoldingClient {
        fn new(counters: &Counters) -> Self {
            Self {
                counters: counters.clone(),
                channel: None,
            }
        }
    }

    #[async_trait::async_trait]
    impl ProtocolClient for HoldingClient {
        async fn start(&mut self, channel: ServerChannel) -> Result<()> {
            self.counters.started.fetch_add(1, Ordering::SeqCst);
            self.channel = Some(channel);
            Ok(())
        }

        async fn stop(&mut self) -> Result<()> {
            self.counters.stopped.fetch_add(1, Ordering::SeqCst);
            self.channel = None;
            Ok(())
        }
    }

    /// Keeps the channel it is given, then refuses to start.
    #[derive(Default, Clone)]
    struct RejectingClient {
        kept: Arc<Mutex<Option<ServerChannel>>>,
    }

    #[async_trait::async_trait]
    impl ProtocolClient for RejectingClient {
        async fn start(&mut self, channel: ServerChannel) -> Result<()> {
            *self.kept.lock().unwrap() = Some(channel);
            Err(LauncherError::Config {
                message: "client refused to start".into(),
            })
        }

        async fn stop(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct NoFetch;

    #[async_trait::async_trait]
    impl ArtifactFetcher for NoFetch {
        async fn fetch(&self, url: &str, _destination: &Path) -> Result<u64> {
            panic!("unexpected fetch of {url}");
        }
    }

    fn dev_settings(port: u16) -> LauncherSettings {
        LauncherSettings {
            dev_host: "127.0.0.1".into(),
            dev_port: port,
            ..LauncherSettings::default()
        }
    }

    #[tokio::test]
    async fn test_development_activation_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            socket.read_exact(&mut buf).await.unwrap();
            socket.write_all(&buf).await.unwrap();
            // Wait for the client side to close.
            let mut rest = Vec::new();
            let _ = socket.read_to_end(&mut rest).await;
        });

        let temp_dir = TempDir::new().unwrap();
        let ctx = ExtensionContext::new(temp_dir.path(), RunMode::Development);
        let counters = Counters::default();

        let mut activation = Activation::activate(&ctx, &dev_settings(port), HoldingClient::new(&counters))
            .await
            .unwrap();

        assert!(matches!(activation.strategy(), TransportStrategy::Socket { .. }));
        assert_eq!(counters.started.load(Ordering::SeqCst), 1);

        let channel = activation.client_mut().channel.as_mut().unwrap();
        channel.writer.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        channel.reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        activation.deactivate().await.unwrap();
        assert_eq!(counters.stopped.load(Ordering::SeqCst), 1);

        server.await.unwrap();
        assert!(!temp_dir.path().join("bin").exists());
    }

    #[tokio::test]
    async fn test_development_connect_failure_does_not_start_client() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let temp_dir = TempDir::new().unwrap();
        let ctx = ExtensionContext::new(temp_dir.path(), RunMode::Development);
        let counters = Counters::default();

        let result = Activation::activate_with(
            &ctx,
            &dev_settings(port),
            PlatformCatalog::pinned(),
            NoFetch,
            HoldingClient::new(&counters),
        )
        .await;

        let err = result.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::ConnectFailure);
        assert_eq!(counters.started.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_production_on_unsupported_host_catalog() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = ExtensionContext::new(temp_dir.path(), RunMode::Production);
        let counters = Counters::default();

        let result = Activation::activate_with(
            &ctx,
            &LauncherSettings::default(),
            &PlatformCatalog::from_entries(Vec::new()),
            NoFetch,
            HoldingClient::new(&counters),
        )
        .await;

        let err = result.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::UnsupportedPlatform);
        assert_eq!(counters.started.load(Ordering::SeqCst), 0);
        assert!(!temp_dir.path().join("bin").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_client_start_failure_kills_spawned_server() {
        // A cached "server" that echoes stdin and never exits on its own
        // while its stdin stays open.
        let temp_dir = TempDir::new().unwrap();
        let bin_dir = temp_dir.path().join("bin");
        std::fs::create_dir_all(&bin_dir).unwrap();
        std::os::unix::fs::symlink("/bin/cat", bin_dir.join("vls")).unwrap();

        let catalog = PlatformCatalog::from_entries(vec![PlatformDescriptor::new(
            platform::current_os_id(),
            "http://example.invalid/vls",
            "vls",
            false,
        )]);
        let ctx = ExtensionContext::new(temp_dir.path(), RunMode::Production);
        let client = RejectingClient::default();

        let err = Activation::activate_with(
            &ctx,
            &LauncherSettings::default(),
            &catalog,
            NoFetch,
            client.clone(),
        )
        .await
        .err()
        .unwrap();

        assert!(matches!(err, LauncherError::Config { .. }));

        // The test still holds the child's stdin, so stdout only reaches EOF
        // because the child was killed.
        let mut channel = client.kept.lock().unwrap().take().unwrap();
        let mut rest = Vec::new();
        let read = tokio::time::timeout(Duration::from_secs(5), channel.reader.read_to_end(&mut rest))
            .await
            .expect("server process was left running");
        assert_eq!(read.unwrap(), 0);
    }
}
