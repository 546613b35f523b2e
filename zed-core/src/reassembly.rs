//! Reassembly engine: collect one frame's chunks at a time and emit the finished image.
//!
//! Single-slot state machine. `Idle` until the first valid datagram, then `Assembling`
//! one frame. A datagram with a different `frame_id` abandons the partial frame and
//! starts a new one. Completion resets to `Idle`. The host feeds datagrams one at a
//! time and acts on the returned outcomes.

use std::collections::BTreeMap;
use std::mem;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::header::{split_datagram, FrameHeader};
use crate::protocol::{MAGIC, VERSION};

/// Why a datagram was dropped without touching reassembly state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    TooShort { len: usize },
    BadMagic(u16),
    BadVersion(u8),
    PayloadLenMismatch { declared: u16, actual: usize },
    /// A frame declaring zero chunks can never complete.
    ZeroChunks,
    /// `chunk_id` not below the frame's authoritative `total_chunks`.
    ChunkOutOfRange { chunk_id: u16, total_chunks: u16 },
}

/// A partial frame dropped before completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Abandoned {
    pub frame_id: u32,
    pub chunks_collected: usize,
    pub total_chunks: u16,
}

/// A fully reassembled frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedFrame {
    pub frame_id: u32,
    pub source: SocketAddr,
    pub total_chunks: u16,
    /// Payloads concatenated by chunk index 0..total_chunks.
    pub bytes: Vec<u8>,
    /// Time from the first accepted datagram of the frame to completion.
    pub elapsed: Duration,
}

/// Result of feeding one datagram to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ignored(IgnoreReason),
    /// The previous in-flight frame was discarded incomplete.
    Abandoned(Abandoned),
    FrameStarted {
        frame_id: u32,
        total_chunks: u16,
        source: SocketAddr,
    },
    /// Chunk stored, or already present (`duplicate`, stored bytes unchanged).
    ChunkAccepted {
        frame_id: u32,
        chunk_id: u16,
        received: usize,
        total_chunks: u16,
        duplicate: bool,
    },
    FrameComplete(CompletedFrame),
}

/// Snapshot of the frame currently being assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlightStatus {
    pub frame_id: u32,
    pub total_chunks: u16,
    pub received: usize,
    pub source: SocketAddr,
}

/// Diagnostic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub ignored: u64,
    pub duplicates: u64,
    /// Datagrams whose `total_chunks` disagreed with the frame's first datagram.
    pub total_mismatches: u64,
    pub frames_started: u64,
    pub frames_completed: u64,
    pub frames_abandoned: u64,
}

struct InFlightFrame {
    frame_id: u32,
    /// Fixed by the datagram that started the frame.
    total_chunks: u16,
    source: SocketAddr,
    /// First writer wins per index; keys are always below `total_chunks`.
    chunks: BTreeMap<u16, Vec<u8>>,
    started_at: Instant,
}

impl InFlightFrame {
    fn new(header: &FrameHeader, source: SocketAddr, now: Instant) -> Self {
        Self {
            frame_id: header.frame_id,
            total_chunks: header.total_chunks,
            source,
            chunks: BTreeMap::new(),
            started_at: now,
        }
    }

    fn is_complete(&self) -> bool {
        self.chunks.len() == self.total_chunks as usize
    }

    fn abandoned(&self) -> Abandoned {
        Abandoned {
            frame_id: self.frame_id,
            chunks_collected: self.chunks.len(),
            total_chunks: self.total_chunks,
        }
    }

    fn into_completed(self, now: Instant) -> CompletedFrame {
        let len = self.chunks.values().map(Vec::len).sum();
        let mut bytes = Vec::with_capacity(len);
        for payload in self.chunks.into_values() {
            bytes.extend_from_slice(&payload);
        }
        CompletedFrame {
            frame_id: self.frame_id,
            source: self.source,
            total_chunks: self.total_chunks,
            bytes,
            elapsed: now.saturating_duration_since(self.started_at),
        }
    }
}

enum State {
    Idle,
    Assembling(InFlightFrame),
}

/// Reassembly engine. Owns at most one in-flight frame; not shared across threads.
pub struct Reassembler {
    state: State,
    stats: EngineStats,
}

impl Reassembler {
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            stats: EngineStats::default(),
        }
    }

    /// Feed one received datagram, timestamped now.
    pub fn accept(&mut self, datagram: &[u8], source: SocketAddr) -> Vec<Outcome> {
        self.accept_at(datagram, source, Instant::now())
    }

    /// Feed one received datagram with an explicit receive time.
    ///
    /// Returns, in order: `Ignored` alone; or optionally `Abandoned` then `FrameStarted`
    /// when the datagram opens a new frame, followed by `ChunkAccepted` or `FrameComplete`.
    pub fn accept_at(&mut self, datagram: &[u8], source: SocketAddr, now: Instant) -> Vec<Outcome> {
        let (header, payload) = match self.check(datagram) {
            Ok(v) => v,
            Err(reason) => {
                self.stats.ignored += 1;
                return vec![Outcome::Ignored(reason)];
            }
        };
        let mut out = Vec::with_capacity(3);

        let current_total = match &self.state {
            State::Assembling(f) if f.frame_id == header.frame_id => Some(f.total_chunks),
            _ => None,
        };
        let total_chunks = current_total.unwrap_or(header.total_chunks);
        if header.chunk_id >= total_chunks {
            self.stats.ignored += 1;
            return vec![Outcome::Ignored(IgnoreReason::ChunkOutOfRange {
                chunk_id: header.chunk_id,
                total_chunks,
            })];
        }

        match current_total {
            Some(total) if total != header.total_chunks => self.stats.total_mismatches += 1,
            Some(_) => {}
            None => {
                let fresh = State::Assembling(InFlightFrame::new(&header, source, now));
                if let State::Assembling(prev) = mem::replace(&mut self.state, fresh) {
                    self.stats.frames_abandoned += 1;
                    out.push(Outcome::Abandoned(prev.abandoned()));
                }
                self.stats.frames_started += 1;
                out.push(Outcome::FrameStarted {
                    frame_id: header.frame_id,
                    total_chunks,
                    source,
                });
            }
        }

        let mut complete = false;
        if let State::Assembling(frame) = &mut self.state {
            let duplicate = frame.chunks.contains_key(&header.chunk_id);
            if duplicate {
                self.stats.duplicates += 1;
            } else {
                frame.chunks.insert(header.chunk_id, payload.to_vec());
            }
            complete = !duplicate && frame.is_complete();
            if !complete {
                out.push(Outcome::ChunkAccepted {
                    frame_id: frame.frame_id,
                    chunk_id: header.chunk_id,
                    received: frame.chunks.len(),
                    total_chunks: frame.total_chunks,
                    duplicate,
                });
            }
        }
        if complete {
            if let State::Assembling(frame) = mem::replace(&mut self.state, State::Idle) {
                self.stats.frames_completed += 1;
                out.push(Outcome::FrameComplete(frame.into_completed(now)));
            }
        }
        out
    }

    /// Drop the in-flight frame, if any (e.g. a deadline elapsed).
    pub fn abandon(&mut self) -> Option<Abandoned> {
        match mem::replace(&mut self.state, State::Idle) {
            State::Assembling(frame) => {
                self.stats.frames_abandoned += 1;
                Some(frame.abandoned())
            }
            State::Idle => None,
        }
    }

    pub fn in_flight(&self) -> Option<InFlightStatus> {
        match &self.state {
            State::Assembling(f) => Some(InFlightStatus {
                frame_id: f.frame_id,
                total_chunks: f.total_chunks,
                received: f.chunks.len(),
                source: f.source,
            }),
            State::Idle => None,
        }
    }

    /// Stored payload for `chunk_id` of the in-flight frame.
    pub fn chunk(&self, chunk_id: u16) -> Option<&[u8]> {
        match &self.state {
            State::Assembling(f) => f.chunks.get(&chunk_id).map(Vec::as_slice),
            State::Idle => None,
        }
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    fn check<'a>(&self, datagram: &'a [u8]) -> Result<(FrameHeader, &'a [u8]), IgnoreReason> {
        let (header, payload) = split_datagram(datagram).map_err(|_| IgnoreReason::TooShort {
            len: datagram.len(),
        })?;
        if header.magic != MAGIC {
            return Err(IgnoreReason::BadMagic(header.magic));
        }
        if header.version != VERSION {
            return Err(IgnoreReason::BadVersion(header.version));
        }
        if payload.len() != header.payload_len as usize {
            return Err(IgnoreReason::PayloadLenMismatch {
                declared: header.payload_len,
                actual: payload.len(),
            });
        }
        if header.total_chunks == 0 {
            return Err(IgnoreReason::ZeroChunks);
        }
        Ok((header, payload))
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}
