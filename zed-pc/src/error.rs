//! Host-side errors: each one ends the current operation only.

use std::path::PathBuf;
use std::time::Duration;

use zed_core::Abandoned;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket bind/send/receive failure.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
    /// Deadline elapsed before every chunk arrived; the partial frame was discarded.
    #[error("timeout after {:.1}s: image incomplete or not received{}", .waited.as_secs_f64(), partial_note(.partial))]
    IncompleteFrame {
        waited: Duration,
        partial: Option<Abandoned>,
    },
    #[error("failed to write {}: {source}", .path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn partial_note(partial: &Option<Abandoned>) -> String {
    match partial {
        Some(a) => format!(
            " (frame_id={} had {}/{} chunks)",
            a.frame_id, a.chunks_collected, a.total_chunks
        ),
        None => String::new(),
    }
}
