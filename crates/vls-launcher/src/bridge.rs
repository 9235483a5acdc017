//! Stand-in protocol client that relays bytes between the editor and server.
//!
//! The editor talks to `vls-launcher` over the launcher's own stdin/stdout.
//! The bridge copies those streams onto the server channel unchanged; message
//! framing stays end to end between editor and server.

use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, Stdin, Stdout};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use vls_core::{LauncherError, ProtocolClient, Result, ServerChannel};

/// Relays an editor-facing reader/writer pair onto the server channel.
pub struct StdioBridge<I, O> {
    input: Option<I>,
    output: Option<O>,
    tasks: Vec<JoinHandle<()>>,
    finished: Arc<Notify>,
}

impl StdioBridge<Stdin, Stdout> {
    /// Bridge this process's own stdin/stdout.
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl<I, O> StdioBridge<I, O>
where
    I: AsyncRead + Send + Unpin + 'static,
    O: AsyncWrite + Send + Unpin + 'static,
{
    pub fn new(input: I, output: O) -> Self {
        Self {
            input: Some(input),
            output: Some(output),
            tasks: Vec::new(),
            finished: Arc::new(Notify::new()),
        }
    }

    /// Resolves once either direction hits end of stream.
    pub async fn finished(&self) {
        self.finished.notified().await;
    }
}

#[async_trait::async_trait]
impl<I, O> ProtocolClient for StdioBridge<I, O>
where
    I: AsyncRead + Send + Unpin + 'static,
    O: AsyncWrite + Send + Unpin + 'static,
{
    async fn start(&mut self, channel: ServerChannel) -> Result<()> {
        let (mut input, mut output) = match (self.input.take(), self.output.take()) {
            (Some(input), Some(output)) => (input, output),
            _ => {
                return Err(LauncherError::Config {
                    message: "stdio bridge was already started".to_string(),
                })
            }
        };
        let ServerChannel {
            mut reader,
            mut writer,
        } = channel;

        let done = self.finished.clone();
        self.tasks.push(tokio::spawn(async move {
            match tokio::io::copy(&mut input, &mut writer).await {
                Ok(bytes) => debug!("Editor closed its stream after {} bytes", bytes),
                Err(e) => warn!("Editor to server relay failed: {}", e),
            }
            let _ = writer.shutdown().await;
            done.notify_one();
        }));

        let done = self.finished.clone();
        self.tasks.push(tokio::spawn(async move {
            match tokio::io::copy(&mut reader, &mut output).await {
                Ok(bytes) => debug!("Server closed its stream after {} bytes", bytes),
                Err(e) => warn!("Server to editor relay failed: {}", e),
            }
            let _ = output.flush().await;
            done.notify_one();
        }));

        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        for task in self.tasks.drain(..) {
            task.abort();
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!("Relay task failed: {}", e);
                }
            }
        }
        Ok(())
    }
}
