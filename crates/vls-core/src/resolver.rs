//! Locates, and if needed downloads and prepares, the server executable.
//!
//! A cached file is trusted on existence alone; the pinned version lives in
//! the catalog, so a file under the cache name is always the right build.
//! "Present" and "runnable" are still tracked separately: a binary whose
//! permission fix-up failed on an earlier activation is repaired here without
//! downloading it again.

use crate::config::PathsConfig;
use crate::error::{LauncherError, Result};
use crate::network::BinaryDownloader;
use crate::platform::{self, PlatformDescriptor};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Source of the server artifact.
#[async_trait::async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Write the artifact at `url` to `destination`, which must not exist yet.
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64>;
}

/// Makes a cached artifact runnable.
pub trait PermissionFixer: Send + Sync {
    /// Whether the file already has the permissions it needs.
    fn is_ready(&self, path: &Path) -> bool;

    /// Grant the permissions. Must be safe to repeat.
    fn apply(&self, path: &Path) -> Result<()>;
}

/// Read+execute for owner/group/other on POSIX platforms.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutePermissions;

impl PermissionFixer for ExecutePermissions {
    fn is_ready(&self, path: &Path) -> bool {
        platform::has_read_execute(path)
    }

    fn apply(&self, path: &Path) -> Result<()> {
        platform::grant_read_execute(path)
    }
}

/// How the executable came to be usable on this call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Already present and runnable; nothing was done.
    Cached,
    /// Fetched on this call (and fixed up, if the platform needs it).
    Downloaded,
    /// Present from an earlier activation but missing its permission fix-up.
    Repaired,
}

/// A runnable server executable in the local cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedExecutable {
    pub path: PathBuf,
    pub status: CacheStatus,
}

/// Resolves catalog entries to runnable paths under `<storage>/bin/`.
pub struct ExecutableResolver<F = BinaryDownloader, P = ExecutePermissions> {
    bin_dir: PathBuf,
    fetcher: F,
    permissions: P,
}

impl<F: ArtifactFetcher> ExecutableResolver<F, ExecutePermissions> {
    /// Create a resolver caching binaries under `storage_dir/bin`.
    ///
    /// A relative `storage_dir` is made absolute against the current
    /// directory.
    pub fn new(storage_dir: &Path, fetcher: F) -> Result<Self> {
        let bin_dir = std::path::absolute(storage_dir.join(PathsConfig::BIN_DIR_NAME))
            .map_err(|e| LauncherError::io("Failed to resolve cache directory", storage_dir, e))?;

        Ok(Self {
            bin_dir,
            fetcher,
            permissions: ExecutePermissions,
        })
    }
}

impl<F: ArtifactFetcher, P: PermissionFixer> ExecutableResolver<F, P> {
    /// Replace the permission fixer.
    pub fn with_permissions<Q: PermissionFixer>(self, permissions: Q) -> ExecutableResolver<F, Q> {
        ExecutableResolver {
            bin_dir: self.bin_dir,
            fetcher: self.fetcher,
            permissions,
        }
    }

    /// Directory holding cached binaries.
    pub fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Absolute cache path for a descriptor.
    pub fn cache_path(&self, descriptor: &PlatformDescriptor) -> PathBuf {
        self.bin_dir.join(&descriptor.local_filename)
    }

    /// Return a runnable executable for `descriptor`, downloading it if absent.
    ///
    /// Any failure is terminal for the caller; nothing is retried here.
    pub async fn resolve(&self, descriptor: &PlatformDescriptor) -> Result<ResolvedExecutable> {
        let path = self.cache_path(descriptor);

        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| LauncherError::io("Failed to inspect cache", &path, e))?;

        if exists {
            if descriptor.needs_permission_fix && !self.permissions.is_ready(&path) {
                info!(
                    "Cached server at {} is not executable, fixing permissions",
                    path.display()
                );
                self.permissions.apply(&path)?;
                return Ok(ResolvedExecutable {
                    path,
                    status: CacheStatus::Repaired,
                });
            }

            debug!("Using cached server at {}", path.display());
            return Ok(ResolvedExecutable {
                path,
                status: CacheStatus::Cached,
            });
        }

        info!(
            "Server binary for {} not cached, downloading {}",
            descriptor.os_id, descriptor.download_url
        );
        self.fetcher.fetch(&descriptor.download_url, &path).await?;

        if descriptor.needs_permission_fix {
            self.permissions.apply(&path)?;
        }

        Ok(ResolvedExecutable {
            path,
            status: CacheStatus::Downloaded,
        })
    }
}
