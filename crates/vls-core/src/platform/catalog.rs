//! Compiled-in table of published server binaries, one per operating system.

use crate::config::ReleaseConfig;
use crate::error::{LauncherError, Result};
use std::sync::OnceLock;

/// How to obtain and prepare the server binary on one operating system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformDescriptor {
    /// Operating system identifier, as reported by `std::env::consts::OS`.
    pub os_id: String,
    /// Full URL of the release artifact.
    pub download_url: String,
    /// File name inside the local `bin/` cache directory.
    pub local_filename: String,
    /// Whether read+execute bits must be granted after download.
    pub needs_permission_fix: bool,
}

impl PlatformDescriptor {
    pub fn new(
        os_id: impl Into<String>,
        download_url: impl Into<String>,
        local_filename: impl Into<String>,
        needs_permission_fix: bool,
    ) -> Self {
        Self {
            os_id: os_id.into(),
            download_url: download_url.into(),
            local_filename: local_filename.into(),
            needs_permission_fix,
        }
    }

    /// Descriptor for a release asset of the pinned server version.
    fn pinned(os_id: &str, asset: &str, local_filename: &str, needs_permission_fix: bool) -> Self {
        Self::new(
            os_id,
            format!(
                "{}/{}/{}",
                ReleaseConfig::HOST,
                ReleaseConfig::SERVER_VERSION,
                asset
            ),
            local_filename,
            needs_permission_fix,
        )
    }
}

/// Closed set of supported platforms.
///
/// Only amd64 artifacts are published. There is no architecture detection:
/// lookup is by OS identifier alone.
#[derive(Debug, Clone)]
pub struct PlatformCatalog {
    entries: Vec<PlatformDescriptor>,
}

static PINNED_CATALOG: OnceLock<PlatformCatalog> = OnceLock::new();

impl PlatformCatalog {
    /// The catalog for the server version this build was released with.
    pub fn pinned() -> &'static PlatformCatalog {
        PINNED_CATALOG.get_or_init(|| PlatformCatalog {
            entries: vec![
                // The .exe suffix already makes the file runnable on Windows.
                PlatformDescriptor::pinned("windows", "vls-windows-amd64.exe", "vls.exe", false),
                PlatformDescriptor::pinned("macos", "vls-darwin-amd64", "vls", true),
                PlatformDescriptor::pinned("linux", "vls-linux-amd64", "vls", true),
            ],
        })
    }

    /// Build a catalog from explicit entries.
    pub fn from_entries(entries: Vec<PlatformDescriptor>) -> Self {
        Self { entries }
    }

    /// Look up the descriptor for an operating system.
    pub fn descriptor_for(&self, os_id: &str) -> Result<&PlatformDescriptor> {
        self.entries
            .iter()
            .find(|d| d.os_id == os_id)
            .ok_or_else(|| LauncherError::UnsupportedPlatform {
                os: os_id.to_string(),
            })
    }

    /// Descriptor for the operating system this process runs on.
    pub fn for_current_host(&self) -> Result<&PlatformDescriptor> {
        self.descriptor_for(super::current_os_id())
    }

    pub fn entries(&self) -> &[PlatformDescriptor] {
        &self.entries
    }
}
