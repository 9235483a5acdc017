//! Establishes the duplex byte channel to the server.
//!
//! No framing happens here; the protocol client owns message parsing. The
//! factory only hands out a reader and a writer and keeps what is needed to
//! tear the connection down again.

use super::selector::TransportStrategy;
use crate::config::LauncherSettings;
use crate::error::{LauncherError, Result, TimedOut};
use std::net::{Shutdown, SocketAddr};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Reading half of the server channel.
pub type ChannelReader = Box<dyn AsyncRead + Send + Unpin>;
/// Writing half of the server channel.
pub type ChannelWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Duplex channel handed to the protocol client.
pub struct ServerChannel {
    pub reader: ChannelReader,
    pub writer: ChannelWriter,
}

impl std::fmt::Debug for ServerChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerChannel").finish_non_exhaustive()
    }
}

/// What has to be closed when the activation ends.
#[derive(Debug)]
pub enum ConnectionHandle {
    /// TCP connection to a separately launched server.
    Socket {
        peer: SocketAddr,
        /// Clone of the socket kept only to shut it down.
        control: std::net::TcpStream,
    },
    /// Server child process; its stdio makes up the channel.
    Process { path: PathBuf, child: Child },
}

/// A live connection: the channel (until taken) plus its teardown handle.
#[derive(Debug)]
pub struct ServerConnection {
    channel: Option<ServerChannel>,
    handle: ConnectionHandle,
}

impl ServerConnection {
    /// Take the channel. Returns `None` once it has been handed out.
    pub fn take_channel(&mut self) -> Option<ServerChannel> {
        self.channel.take()
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    /// Close the socket, or kill and reap the child process.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.channel);

        match self.handle {
            ConnectionHandle::Socket { peer, control } => {
                match control.shutdown(Shutdown::Both) {
                    Ok(()) => debug!("Closed server socket {}", peer),
                    // The server already hung up.
                    Err(e) if e.kind() == std::io::ErrorKind::NotConnected => {
                        debug!("Server socket {} was already closed", peer)
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            ConnectionHandle::Process { path, mut child } => {
                let status = match child
                    .try_wait()
                    .map_err(|e| LauncherError::io("Failed to poll server process", &path, e))?
                {
                    Some(status) => status,
                    None => {
                        if let Err(e) = child.start_kill() {
                            warn!("Failed to kill server process {}: {}", path.display(), e);
                        }
                        child
                            .wait()
                            .await
                            .map_err(|e| LauncherError::io("Failed to reap server process", &path, e))?
                    }
                };
                info!("Server process {} exited with {}", path.display(), status);
            }
        }

        Ok(())
    }
}

/// Builds [`ServerConnection`]s from a [`TransportStrategy`].
#[derive(Debug, Clone, Default)]
pub struct ConnectionFactory {
    connect_timeout: Option<Duration>,
}

impl ConnectionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &LauncherSettings) -> Self {
        Self {
            connect_timeout: settings.connect_timeout(),
        }
    }

    /// Bound the socket connect. `None` waits indefinitely.
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Open the channel. A failure is returned as-is; nothing is retried.
    pub async fn connect(&self, strategy: &TransportStrategy) -> Result<ServerConnection> {
        match strategy {
            TransportStrategy::Socket { host, port } => self.connect_socket(host, *port).await,
            TransportStrategy::Spawn { path } => Self::spawn(path),
        }
    }

    async fn connect_socket(&self, host: &str, port: u16) -> Result<ServerConnection> {
        let connect = TcpStream::connect((host, port));
        let stream = match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, connect)
                .await
                .map_err(|_| LauncherError::Timeout {
                    operation: TimedOut::Connect,
                    target: format!("{}:{}", host, port),
                    after: limit,
                })?,
            None => connect.await,
        }
        .map_err(|source| LauncherError::Connect {
            host: host.to_string(),
            port,
            source,
        })?;

        let peer = stream.peer_addr()?;
        let std_stream = stream.into_std()?;
        let control = std_stream.try_clone()?;
        let stream = TcpStream::from_std(std_stream)?;
        let (reader, writer) = stream.into_split();

        info!("Connected to language server at {}", peer);

        Ok(ServerConnection {
            channel: Some(ServerChannel {
                reader: Box::new(reader),
                writer: Box::new(writer),
            }),
            handle: ConnectionHandle::Socket { peer, control },
        })
    }

    fn spawn(path: &Path) -> Result<ServerConnection> {
        let spawn_error = |source: std::io::Error| LauncherError::Spawn {
            path: path.to_path_buf(),
            source,
        };

        let mut child = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_error)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| spawn_error(std::io::Error::other("server stdin was not captured")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_error(std::io::Error::other("server stdout was not captured")))?;

        info!(
            "Spawned language server {} (pid {:?})",
            path.display(),
            child.id()
        );

        Ok(ServerConnection {
            channel: Some(ServerChannel {
                reader: Box::new(stdout),
                writer: Box::new(stdin),
            }),
            handle: ConnectionHandle::Process {
                path: path.to_path_buf(),
                child,
            },
        })
    }
}
