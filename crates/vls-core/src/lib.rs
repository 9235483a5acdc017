//! VLS Core - launcher and transport layer for the Verilog Language Server client.
//!
//! The server binary is built and released separately. This crate decides how
//! to reach a running instance of it and opens the byte channel the protocol
//! client talks over:
//!
//! - **Development**: the server is already running (usually under a
//!   debugger) and is reached over a loopback TCP socket.
//! - **Production**: the binary for this OS is taken from the local cache,
//!   downloaded on first use, made executable, and spawned; its stdin/stdout
//!   form the channel.
//!
//! # Example
//!
//! ```rust,ignore
//! use vls_core::{Activation, ExtensionContext, LauncherSettings, RunMode};
//!
//! let ctx = ExtensionContext::new("/path/to/storage", RunMode::Production);
//! let settings = LauncherSettings::default().with_env_overrides()?;
//! let activation = Activation::activate(&ctx, &settings, my_client).await?;
//! // ...
//! activation.deactivate().await?;
//! ```

pub mod activation;
pub mod config;
pub mod error;
pub mod network;
pub mod platform;
pub mod resolver;
pub mod transport;

// Re-export commonly used types
pub use activation::{Activation, ExtensionContext, ProtocolClient};
pub use config::LauncherSettings;
pub use error::{ErrorKind, LauncherError, Result, TimedOut};
pub use network::{BinaryDownloader, DownloadProgress};
pub use platform::{PlatformCatalog, PlatformDescriptor};
pub use resolver::{
    ArtifactFetcher, CacheStatus, ExecutableResolver, ExecutePermissions, PermissionFixer,
    ResolvedExecutable,
};
pub use transport::{
    ConnectionFactory, ConnectionHandle, RunMode, ServerChannel, ServerConnection,
    TransportSelector, TransportStrategy,
};
