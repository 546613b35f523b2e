//! Human-readable status events for the front-end (CLI printer or GUI status bar).

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use zed_core::Abandoned;

use crate::control::Reply;

/// Progress is reported every this many chunks, and at completion.
pub const PROGRESS_EVERY: usize = 20;

pub type StatusTx = mpsc::UnboundedSender<Status>;

#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    CommandReply {
        command: String,
        reply: Reply,
    },
    Listening {
        addr: SocketAddr,
    },
    FrameStarted {
        frame_id: u32,
        source: SocketAddr,
        total_chunks: u16,
    },
    Progress {
        received: usize,
        total_chunks: u16,
    },
    FrameAbandoned(Abandoned),
    ImageWritten {
        path: PathBuf,
        bytes: usize,
        elapsed: Duration,
    },
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::CommandReply { command, reply } => {
                write!(f, "Command '{}' -> {}", command, reply)
            }
            Status::Listening { addr } => write!(f, "Listening UDP on {} ...", addr),
            Status::FrameStarted {
                frame_id,
                source,
                total_chunks,
            } => write!(
                f,
                "Receiving frame_id={} from {}, total_chunks={}",
                frame_id, source, total_chunks
            ),
            Status::Progress {
                received,
                total_chunks,
            } => write!(f, "  got {}/{}", received, total_chunks),
            Status::FrameAbandoned(a) => write!(
                f,
                "Dropped incomplete frame_id={} ({}/{} chunks)",
                a.frame_id, a.chunks_collected, a.total_chunks
            ),
            Status::ImageWritten {
                path,
                bytes,
                elapsed,
            } => write!(
                f,
                "Frame complete: wrote {} bytes to {} in {:.3}s",
                bytes,
                path.display(),
                elapsed.as_secs_f64()
            ),
        }
    }
}

/// Send a status event; a closed front-end is not an error for the worker.
pub fn report(tx: &StatusTx, status: Status) {
    let _ = tx.send(status);
}

/// True when a progress line is due after `received` chunks of an incomplete frame.
/// The completing chunk always gets one, from the `FrameComplete` outcome.
pub fn progress_due(received: usize) -> bool {
    received % PROGRESS_EVERY == 0
}
