//! Image sender: fragment a file and stream it as paced datagrams.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use tokio::net::UdpSocket;
use zed_core::integrity::short_digest;
use zed_core::{split_into_datagrams, SplitError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    pub frame_id: u32,
    pub bytes: usize,
    pub chunks: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("cannot read image {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Split(#[from] SplitError),
    #[error("send failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Send `data` to `dst` as frame `frame_id`, sleeping `delay` after each datagram.
pub async fn send_image(
    socket: &UdpSocket,
    dst: SocketAddr,
    data: &[u8],
    frame_id: u32,
    chunk_size: usize,
    delay: Duration,
) -> Result<SendReport, SendError> {
    let dgrams = split_into_datagrams(frame_id, data, chunk_size)?;
    for d in &dgrams {
        socket.send_to(d, dst).await?;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    log::info!(
        "sent frame_id={} ({} bytes, {} chunks, sha256 {}) to {}",
        frame_id,
        data.len(),
        dgrams.len(),
        short_digest(data),
        dst
    );
    Ok(SendReport {
        frame_id,
        bytes: data.len(),
        chunks: dgrams.len(),
    })
}

/// Read `path` and send it with `send_image`.
pub async fn send_file(
    socket: &UdpSocket,
    dst: SocketAddr,
    path: &Path,
    frame_id: u32,
    chunk_size: usize,
    delay: Duration,
) -> Result<SendReport, SendError> {
    let data = tokio::fs::read(path).await.map_err(|source| SendError::Read {
        path: path.display().to_string(),
        source,
    })?;
    send_image(socket, dst, &data, frame_id, chunk_size, delay).await
}
