//! Inbound datagram socket.
//!
//! Each datagram carries one JSON object with a string `message` field.
//! Anything else is a transport error and is dropped by the scheduler.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tokio::net::UnixDatagram;
use tracing::{debug, info};

use crate::config::SocketConfig;
use crate::error::{Result, SeqreadError};
use crate::stage::{PendingText, Receive, StageFuture};

#[derive(Deserialize)]
struct InboundMessage {
    message: String,
}

/// Extract the `message` text from one datagram payload.
pub fn parse_datagram(payload: &[u8]) -> Result<PendingText> {
    let inbound: InboundMessage = serde_json::from_slice(payload)
        .map_err(|e| SeqreadError::Transport(format!("invalid payload: {e}")))?;
    Ok(PendingText(inbound.message))
}

/// Bind the daemon socket, replacing any stale socket file.
///
/// Must be called from within a tokio runtime.
pub fn bind_socket(config: &SocketConfig) -> Result<UnixDatagram> {
    let path = &config.path;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                SeqreadError::Transport(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
    }
    if path.exists() {
        debug!("Removing stale socket {}", path.display());
        fs::remove_file(path).map_err(|e| {
            SeqreadError::Transport(format!("cannot remove stale {}: {e}", path.display()))
        })?;
    }

    let socket = UnixDatagram::bind(path)
        .map_err(|e| SeqreadError::Transport(format!("cannot bind {}: {e}", path.display())))?;
    fs::set_permissions(path, fs::Permissions::from_mode(config.mode))?;

    info!("Listening on {} (mode {:o})", path.display(), config.mode);
    Ok(socket)
}

/// Receives one message per call from the bound socket.
pub struct SocketReceiver {
    socket: Arc<UnixDatagram>,
    max_size: usize,
    path: PathBuf,
}

impl SocketReceiver {
    pub fn bind(config: &SocketConfig) -> Result<Self> {
        let socket = bind_socket(config)?;
        Ok(Self {
            socket: Arc::new(socket),
            max_size: config.max_datagram_size,
            path: config.path.clone(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn receive_one(socket: Arc<UnixDatagram>, max_size: usize) -> Result<PendingText> {
    // One spare byte: a datagram that fills it was truncated by the kernel.
    let mut buf = vec![0u8; max_size + 1];
    let len = socket.recv(&mut buf).await?;
    if len > max_size {
        return Err(SeqreadError::Transport(format!(
            "datagram exceeds {max_size} bytes"
        )));
    }
    debug!("Received {len} byte datagram");
    parse_datagram(&buf[..len])
}

impl Receive for SocketReceiver {
    fn receive(&self) -> StageFuture<PendingText> {
        Box::pin(receive_one(self.socket.clone(), self.max_size))
    }
}
