//! Platform abstraction layer.
//!
//! All `#[cfg]` blocks for OS-specific behavior live in this module:
//! - `catalog` - Which server artifact each operating system uses
//! - `permissions` - Granting execute bits on the downloaded binary

pub mod catalog;
pub mod permissions;

pub use catalog::{PlatformCatalog, PlatformDescriptor};
pub use permissions::{grant_read_execute, has_read_execute};

/// Returns the operating system identifier used as the catalog key.
pub fn current_os_id() -> &'static str {
    std::env::consts::OS
}
