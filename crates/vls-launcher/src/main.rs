//! VLS Launcher - connects an editor to the Verilog Language Server.
//!
//! In production mode the launcher resolves (downloading on first use) and
//! spawns the server binary; in development mode it attaches to a server that
//! is already listening on a loopback port. Either way the editor talks to the
//! launcher over stdin/stdout, so all logging goes to stderr.

mod bridge;

use anyhow::{Context, Result};
use bridge::StdioBridge;
use clap::{Parser, Subcommand};
use std::future::Future;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vls_core::config::{ClientConfig, ReleaseConfig};
use vls_core::{
    Activation, BinaryDownloader, DownloadProgress, ExecutableResolver, ExtensionContext,
    LauncherSettings, PlatformCatalog, RunMode,
};

#[derive(Parser, Debug)]
#[command(name = "vls-launcher")]
#[command(about = "Launch or attach to the Verilog Language Server")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Extension storage directory (server binaries are cached under bin/)
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,

    /// Run mode: development, production or test (defaults to $VLS_EXTENSION_MODE, then production)
    #[arg(long, global = true)]
    mode: Option<RunMode>,

    /// JSON settings file
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Development server host (overrides $VLS_HOST)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Development server port (overrides $VLS_PORT)
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Activate and relay stdin/stdout to the server (default)
    Serve,
    /// Resolve the server binary for this platform and print its path
    Resolve,
    /// List the platforms a server binary is published for
    Platforms,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // stdout carries protocol traffic; logs must go to stderr
    let default_level = if args.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let settings = load_settings(&args)?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&args, settings).await,
        Command::Resolve => resolve(&args, &settings).await,
        Command::Platforms => {
            list_platforms();
            Ok(())
        }
    }
}

/// Defaults, then the settings file, then the environment, then flags.
fn load_settings(args: &Args) -> Result<LauncherSettings> {
    let base = match &args.settings {
        Some(path) => LauncherSettings::from_file(path)?,
        None => LauncherSettings::default(),
    };
    let mut settings = base.with_env_overrides()?;

    if let Some(host) = &args.host {
        settings.dev_host = host.clone();
    }
    if let Some(port) = args.port {
        settings.dev_port = port;
    }

    settings.validate()?;
    Ok(settings)
}

fn storage_dir(args: &Args) -> Result<PathBuf> {
    match &args.storage_dir {
        Some(dir) => Ok(dir.clone()),
        None => dirs::data_local_dir()
            .map(|dir| dir.join("vls-client"))
            .context("Could not determine a storage directory; pass --storage-dir"),
    }
}

fn downloader(settings: &LauncherSettings) -> Result<BinaryDownloader> {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(log_progress(rx));
    Ok(BinaryDownloader::new()?
        .with_timeout(settings.download_timeout())
        .with_progress(tx))
}

async fn log_progress(mut rx: mpsc::Receiver<DownloadProgress>) {
    while let Some(progress) = rx.recv().await {
        match progress.percent {
            Some(percent) => info!(
                "Downloading server: {:.0}% ({} bytes)",
                percent, progress.bytes_downloaded
            ),
            None => info!("Downloading server: {} bytes", progress.bytes_downloaded),
        }
    }
}

async fn serve(args: &Args, settings: LauncherSettings) -> Result<()> {
    let mode = match args.mode {
        Some(mode) => mode,
        None => RunMode::from_env()?.unwrap_or(RunMode::Production),
    };
    let storage = storage_dir(args)?;

    info!(
        "Starting {} ({}) for {}:{} documents",
        ClientConfig::CLIENT_NAME,
        ClientConfig::CLIENT_ID,
        ClientConfig::DOCUMENT_SCHEME,
        ClientConfig::DOCUMENT_LANGUAGE
    );

    let ctx = ExtensionContext::new(storage, mode);
    let activation = Activation::activate_with(
        &ctx,
        &settings,
        PlatformCatalog::pinned(),
        downloader(&settings)?,
        StdioBridge::stdio(),
    )
    .await
    .context("Activation failed")?;

    info!("Language server connected via {}", activation.strategy());

    wait_for_shutdown(tokio::signal::ctrl_c(), activation.client().finished()).await;

    activation.deactivate().await?;
    info!("Deactivated");
    Ok(())
}

/// Wait for ctrl-c or for the channel to close, whichever comes first.
///
/// If the signal listener cannot be installed, only the channel is waited on.
/// The caller always goes on to deactivate.
async fn wait_for_shutdown<S, F>(signal: S, finished: F)
where
    S: Future<Output = std::io::Result<()>>,
    F: Future<Output = ()>,
{
    tokio::pin!(finished);

    tokio::select! {
        result = signal => match result {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => {
                warn!("Failed to listen for shutdown signal: {}", e);
                (&mut finished).await;
                info!("Channel closed");
            }
        },
        _ = &mut finished => info!("Channel closed"),
    }
}

async fn resolve(args: &Args, settings: &LauncherSettings) -> Result<()> {
    let storage = storage_dir(args)?;
    let descriptor = PlatformCatalog::pinned().for_current_host()?;
    let resolver = ExecutableResolver::new(&storage, downloader(settings)?)?;

    let resolved = resolver.resolve(descriptor).await?;
    info!("Server binary {:?}: {}", resolved.status, resolved.path.display());
    println!("{}", resolved.path.display());
    Ok(())
}

fn list_platforms() {
    println!("server version {}", ReleaseConfig::SERVER_VERSION);
    for entry in PlatformCatalog::pinned().entries() {
        let note = if entry.needs_permission_fix {
            "chmod +rx"
        } else {
            "as downloaded"
        };
        println!(
            "{:<8} {:<8} {:<14} {}",
            entry.os_id,
            entry.local_filename,
            note,
            entry.download_url
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_serve() {
        let args = Args::parse_from(["vls-launcher"]);
        assert!(args.command.is_none());
        assert!(!args.debug);
    }

    #[test]
    fn test_mode_flag_parses_host_names() {
        let args = Args::parse_from(["vls-launcher", "--mode", "development", "serve"]);
        assert_eq!(args.mode, Some(RunMode::Development));
        assert_eq!(args.command, Some(Command::Serve));

        let args = Args::parse_from(["vls-launcher", "resolve", "--mode", "test"]);
        assert_eq!(args.mode, Some(RunMode::Production));
    }

    #[test]
    fn test_invalid_mode_is_rejected() {
        assert!(Args::try_parse_from(["vls-launcher", "--mode", "staging"]).is_err());
    }

    #[test]
    fn test_cli_flags_override_settings_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "devHost": "10.0.0.2", "devPort": 5000 }"#).unwrap();

        let args = Args::parse_from([
            "vls-launcher",
            "--settings",
            path.to_str().unwrap(),
            "--port",
            "6000",
        ]);
        let settings = load_settings(&args).unwrap();

        assert_eq!(settings.dev_port, 6000);
        if std::env::var("VLS_HOST").is_err() {
            assert_eq!(settings.dev_host, "10.0.0.2");
        }
    }

    #[tokio::test]
    async fn test_signal_failure_still_waits_for_channel() {
        use std::sync::Arc;
        use tokio::sync::Notify;

        let closed = Arc::new(Notify::new());
        let notifier = closed.clone();
        let waiter = tokio::spawn(async move {
            let broken_signal = async { Err::<(), _>(std::io::Error::other("no signal handler")) };
            wait_for_shutdown(broken_signal, notifier.notified()).await;
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        closed.notify_one();
        tokio::time::timeout(std::time::Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_signal_ends_wait_without_channel_close() {
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            wait_for_shutdown(async { Ok::<(), std::io::Error>(()) }, std::future::pending::<()>()),
        )
        .await
        .unwrap();
    }

    #[test]
    fn test_port_zero_is_rejected_from_any_layer() {
        let args = Args::parse_from(["vls-launcher", "--port", "0"]);
        assert!(load_settings(&args).is_err());

        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "devPort": 0 }"#).unwrap();
        let args = Args::parse_from(["vls-launcher", "--settings", path.to_str().unwrap()]);
        if std::env::var("VLS_PORT").is_err() {
            assert!(load_settings(&args).is_err());
        }

        // A later layer can still fix an earlier bad value.
        let args = Args::parse_from([
            "vls-launcher",
            "--settings",
            path.to_str().unwrap(),
            "--port",
            "7000",
        ]);
        assert_eq!(load_settings(&args).unwrap().dev_port, 7000);
    }

    #[test]
    fn test_explicit_storage_dir() {
        let args = Args::parse_from(["vls-launcher", "--storage-dir", "/tmp/vls-store"]);
        assert_eq!(storage_dir(&args).unwrap(), PathBuf::from("/tmp/vls-store"));
    }
}
