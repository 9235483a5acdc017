//! Streaming download of the server binary into the local cache.
//!
//! The destination is opened with exclusive creation before any request is
//! made. If two activations race for the same cache path, the second one fails
//! with a file-system error instead of interleaving bytes into the first one's
//! file.

use crate::config::NetworkConfig;
use crate::error::TimedOut;
use crate::network::client::HttpClient;
use crate::resolver::ArtifactFetcher;
use crate::{LauncherError, Result};
use futures::StreamExt;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

/// Progress information for a download.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadProgress {
    /// Bytes written to disk so far.
    pub bytes_downloaded: u64,
    /// Total bytes (if the server sent a content length).
    pub total_bytes: Option<u64>,
    /// Percentage complete (0-100).
    pub percent: Option<f64>,
}

impl DownloadProgress {
    fn new(bytes_downloaded: u64, total_bytes: Option<u64>) -> Self {
        let percent = total_bytes.map(|total| {
            if total > 0 {
                (bytes_downloaded as f64 / total as f64) * 100.0
            } else {
                0.0
            }
        });

        Self {
            bytes_downloaded,
            total_bytes,
            percent,
        }
    }
}

/// Fetches a remote artifact and writes it to a new local file.
pub struct BinaryDownloader {
    http: HttpClient,
    /// Upper bound on the whole transfer, if any.
    timeout: Option<Duration>,
    progress_tx: Option<mpsc::Sender<DownloadProgress>>,
    progress_interval: Duration,
}

impl BinaryDownloader {
    pub fn new() -> Result<Self> {
        Ok(Self::with_client(HttpClient::new()?))
    }

    pub fn with_client(http: HttpClient) -> Self {
        Self {
            http,
            timeout: None,
            progress_tx: None,
            progress_interval: NetworkConfig::DOWNLOAD_PROGRESS_INTERVAL,
        }
    }

    /// Bound the whole transfer. `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Report progress on a channel while streaming.
    pub fn with_progress(mut self, tx: mpsc::Sender<DownloadProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    /// Download `url` into `destination`.
    ///
    /// Fails with an IO error if `destination` already exists; the existing
    /// file is never touched. On any failure after the file was created, the
    /// partial file is removed.
    ///
    /// # Returns
    ///
    /// Total bytes written on success
    pub async fn download(&self, url: &str, destination: &Path) -> Result<u64> {
        let parsed = Url::parse(url).map_err(|e| LauncherError::Network {
            url: url.to_string(),
            message: format!("Invalid download URL: {}", e),
            status: None,
            source: None,
        })?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io("Failed to create directory", parent, e))?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(destination)
            .await
            .map_err(|e| LauncherError::io("Failed to create destination", destination, e))?;

        let transfer = self.stream_to_file(parsed.as_str(), file, destination);
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, transfer)
                .await
                .unwrap_or_else(|_| {
                    Err(LauncherError::Timeout {
                        operation: TimedOut::Download,
                        target: url.to_string(),
                        after: limit,
                    })
                }),
            None => transfer.await,
        };

        match result {
            Ok(bytes) => {
                info!("Downloaded {} bytes to {}", bytes, destination.display());
                Ok(bytes)
            }
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(destination).await {
                    warn!(
                        "Failed to remove partial download {}: {}",
                        destination.display(),
                        remove_err
                    );
                }
                Err(e)
            }
        }
    }

    async fn stream_to_file(&self, url: &str, mut file: File, path: &Path) -> Result<u64> {
        let response = self.http.get_success(url).await?;
        let total_bytes = response.content_length();

        let mut bytes_downloaded: u64 = 0;
        let mut last_progress_update = Instant::now();
        let mut stream = response.bytes_stream();

        self.report(DownloadProgress::new(0, total_bytes)).await;

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| LauncherError::Network {
                url: url.to_string(),
                message: format!("Error reading download stream: {}", e),
                status: None,
                source: Some(e),
            })?;

            file.write_all(&chunk)
                .await
                .map_err(|e| LauncherError::io("Failed to write download", path, e))?;

            bytes_downloaded += chunk.len() as u64;

            if last_progress_update.elapsed() >= self.progress_interval {
                self.report(DownloadProgress::new(bytes_downloaded, total_bytes))
                    .await;
                last_progress_update = Instant::now();
            }
        }

        file.flush()
            .await
            .map_err(|e| LauncherError::io("Failed to flush download", path, e))?;
        file.sync_all()
            .await
            .map_err(|e| LauncherError::io("Failed to sync download", path, e))?;

        self.report(DownloadProgress::new(bytes_downloaded, total_bytes))
            .await;

        Ok(bytes_downloaded)
    }

    async fn report(&self, progress: DownloadProgress) {
        debug!(
            "Download progress: {} / {:?} bytes",
            progress.bytes_downloaded, progress.total_bytes
        );
        if let Some(ref tx) = self.progress_tx {
            let _ = tx.send(progress).await;
        }
    }
}

#[async_trait::async_trait]
impl ArtifactFetcher for BinaryDownloader {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64> {
        self.download(url, destination).await
    }
}
