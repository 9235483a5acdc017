//! Platform-specific file permission handling for the cached server binary.

use crate::error::{LauncherError, Result};
use std::path::Path;
use tracing::debug;

/// Read and execute for owner, group and other.
pub const READ_EXECUTE_MASK: u32 = 0o555;

/// Grant read+execute to owner/group/other, keeping any bits already set.
///
/// Safe to call repeatedly on the same file.
///
/// # Platform Behavior
/// - **Linux/macOS**: ORs [`READ_EXECUTE_MASK`] into the file mode
/// - **Windows**: No-op (executability comes from the file extension)
pub fn grant_read_execute(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata =
            std::fs::metadata(path).map_err(|e| LauncherError::io_with_path(e, path))?;
        let mut permissions = metadata.permissions();
        let mode = permissions.mode() | READ_EXECUTE_MASK;
        permissions.set_mode(mode);
        std::fs::set_permissions(path, permissions)
            .map_err(|e| LauncherError::io("Failed to set permissions", path, e))?;
        debug!("Set mode {:o} on {}", mode & 0o7777, path.display());
    }

    #[cfg(not(unix))]
    {
        if !path.exists() {
            return Err(LauncherError::io_with_path(
                std::io::Error::from(std::io::ErrorKind::NotFound),
                path,
            ));
        }
        debug!("Skipping permission fix-up for: {}", path.display());
    }

    Ok(())
}

/// Check whether a file already carries the full read+execute mask.
///
/// # Platform Behavior
/// - **Linux/macOS**: All bits of [`READ_EXECUTE_MASK`] are set
/// - **Windows**: The file exists (the extension decides executability)
pub fn has_read_execute(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path)
            .map(|m| m.permissions().mode() & READ_EXECUTE_MASK == READ_EXECUTE_MASK)
            .unwrap_or(false)
    }

    #[cfg(not(unix))]
    {
        path.exists()
    }
}
