//! Image reception: pump datagrams into the reassembly engine and persist completed frames.
//!
//! Two policies share the engine. `run_server` listens until shutdown and writes every
//! completed frame. `receive_image` stops at the first completed frame or when its
//! overall deadline elapses.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::Instant;
use zed_core::integrity::short_digest;
use zed_core::{Command, CompletedFrame, Outcome, Reassembler};

use crate::config::Config;
use crate::control;
use crate::error::Error;
use crate::status::{progress_due, report, Status, StatusTx};

/// Large enough for any UDP datagram.
const MAX_DATAGRAM: usize = 65536;

/// Where datagrams come from. The receive call is the loop's only suspension point.
#[allow(async_fn_in_trait)]
pub trait DatagramSource {
    async fn recv_datagram(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

impl DatagramSource for UdpSocket {
    async fn recv_datagram(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.recv_from(buf).await
    }
}

/// Successful bounded request.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageReceived {
    pub frame_id: u32,
    pub path: PathBuf,
    pub bytes: usize,
    pub elapsed: Duration,
}

/// Listen until `shutdown` resolves, writing each completed frame to `output`.
/// `poll` only bounds each receive so idle periods are visible; it is not a protocol deadline.
/// Receive errors are logged and skipped, as on the board's control server.
pub async fn run_server<S: DatagramSource>(
    mut source: S,
    output: &Path,
    poll: Duration,
    status: &StatusTx,
    shutdown: impl Future<Output = ()>,
) -> Result<(), Error> {
    let mut engine = Reassembler::new();
    let mut buf = vec![0u8; MAX_DATAGRAM];
    tokio::pin!(shutdown);
    loop {
        let received = tokio::select! {
            _ = &mut shutdown => break,
            r = tokio::time::timeout(poll, source.recv_datagram(&mut buf)) => r,
        };
        let (n, from) = match received {
            Ok(Ok(r)) => r,
            Ok(Err(e)) => {
                log::warn!("image receive failed: {}", e);
                continue;
            }
            Err(_) => {
                log::trace!("no datagram within {:?}", poll);
                continue;
            }
        };
        let Some(frame) = feed(&mut engine, &buf[..n], from, status) else {
            continue;
        };
        // A failed write loses this frame only; keep listening for the next.
        match write_output(output, &frame).await {
            Ok(()) => report(status, written(output, &frame)),
            Err(e) => log::warn!("{}", e),
        }
    }
    let stats = engine.stats();
    log::info!(
        "listener stopped: {} frames complete, {} abandoned, {} datagrams ignored",
        stats.frames_completed,
        stats.frames_abandoned,
        stats.ignored
    );
    Ok(())
}

/// Receive until one frame completes or `deadline` elapses. On timeout the partial
/// frame is discarded and nothing is written.
pub async fn receive_image<S: DatagramSource>(
    mut source: S,
    output: &Path,
    deadline: Duration,
    status: &StatusTx,
) -> Result<ImageReceived, Error> {
    let until = Instant::now() + deadline;
    let mut engine = Reassembler::new();
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        let (n, from) = match tokio::time::timeout_at(until, source.recv_datagram(&mut buf)).await {
            Ok(r) => r?,
            Err(_) => {
                let partial = engine.abandon();
                log::info!("image request timed out after {:?}", deadline);
                return Err(Error::IncompleteFrame {
                    waited: deadline,
                    partial,
                });
            }
        };
        if let Some(frame) = feed(&mut engine, &buf[..n], from, status) {
            write_output(output, &frame).await?;
            report(status, written(output, &frame));
            return Ok(ImageReceived {
                frame_id: frame.frame_id,
                path: output.to_path_buf(),
                bytes: frame.bytes.len(),
                elapsed: frame.elapsed,
            });
        }
    }
}

/// Bounded-client policy end to end: bind the image port, ask the board for an image,
/// and receive it. The receive deadline runs while the command is in flight.
pub async fn request_image(cfg: &Config, status: &StatusTx) -> Result<ImageReceived, Error> {
    let rx = UdpSocket::bind(cfg.image_listen_addr()).await?;
    let command = Command::RequestImage {
        port: cfg.image_port,
    };
    let ask = async {
        let reply = control::send_command(cfg.board_ctrl_addr(), &command, cfg.reply_timeout()).await?;
        report(
            status,
            Status::CommandReply {
                command: command.to_wire(),
                reply,
            },
        );
        Ok::<(), Error>(())
    };
    let (_, image) = tokio::try_join!(
        ask,
        receive_image(rx, &cfg.output, cfg.request_deadline(), status)
    )?;
    Ok(image)
}

/// Feed one datagram and translate outcomes into status events.
fn feed(
    engine: &mut Reassembler,
    datagram: &[u8],
    from: SocketAddr,
    status: &StatusTx,
) -> Option<CompletedFrame> {
    let mut done = None;
    for outcome in engine.accept_at(datagram, from, Instant::now().into_std()) {
        match outcome {
            Outcome::Ignored(reason) => log::trace!("ignored datagram from {}: {:?}", from, reason),
            Outcome::Abandoned(a) => {
                log::debug!(
                    "abandoned frame_id={} with {}/{} chunks",
                    a.frame_id,
                    a.chunks_collected,
                    a.total_chunks
                );
                report(status, Status::FrameAbandoned(a));
            }
            Outcome::FrameStarted {
                frame_id,
                total_chunks,
                source,
            } => {
                log::info!(
                    "receiving frame_id={} from {}, total_chunks={}",
                    frame_id,
                    source,
                    total_chunks
                );
                report(
                    status,
                    Status::FrameStarted {
                        frame_id,
                        source,
                        total_chunks,
                    },
                );
            }
            Outcome::ChunkAccepted {
                received,
                total_chunks,
                duplicate,
                ..
            } => {
                if !duplicate && progress_due(received) {
                    report(
                        status,
                        Status::Progress {
                            received,
                            total_chunks,
                        },
                    );
                }
            }
            Outcome::FrameComplete(frame) => {
                log::info!(
                    "frame_id={} complete: {} bytes in {:?}, sha256 {}",
                    frame.frame_id,
                    frame.bytes.len(),
                    frame.elapsed,
                    short_digest(&frame.bytes)
                );
                report(
                    status,
                    Status::Progress {
                        received: frame.total_chunks as usize,
                        total_chunks: frame.total_chunks,
                    },
                );
                done = Some(frame);
            }
        }
    }
    done
}

/// Whole-buffer write, no locking: one request per output path at a time.
async fn write_output(path: &Path, frame: &CompletedFrame) -> Result<(), Error> {
    tokio::fs::write(path, &frame.bytes)
        .await
        .map_err(|source| Error::Output {
            path: path.to_path_buf(),
            source,
        })
}

fn written(path: &Path, frame: &CompletedFrame) -> Status {
    Status::ImageWritten {
        path: path.to_path_buf(),
        bytes: frame.bytes.len(),
        elapsed: frame.elapsed,
    }
}
