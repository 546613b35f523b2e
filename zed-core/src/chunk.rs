//! Sender-side fragmentation: split an image into numbered datagrams.

use crate::header::{encode_datagram, FrameHeader};

/// Split `data` into datagrams of at most `chunk_size` payload bytes each, numbered 0..total.
/// The last chunk carries the remainder.
pub fn split_into_datagrams(
    frame_id: u32,
    data: &[u8],
    chunk_size: usize,
) -> Result<Vec<Vec<u8>>, SplitError> {
    if data.is_empty() {
        return Err(SplitError::Empty);
    }
    if chunk_size == 0 || chunk_size > u16::MAX as usize {
        return Err(SplitError::BadChunkSize(chunk_size));
    }
    let total = chunk_count(data.len(), chunk_size);
    let total = u16::try_from(total).map_err(|_| SplitError::TooManyChunks(total))?;
    Ok(data
        .chunks(chunk_size)
        .enumerate()
        .map(|(i, payload)| {
            let h = FrameHeader::new(frame_id, i as u16, total, payload.len() as u16);
            encode_datagram(&h, payload)
        })
        .collect())
}

/// Number of chunks needed for `len` bytes, rounding up.
pub fn chunk_count(len: usize, chunk_size: usize) -> usize {
    len.div_ceil(chunk_size)
}

/// Error splitting an image into datagrams.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SplitError {
    #[error("nothing to send: image is empty")]
    Empty,
    #[error("chunk size {0} out of range")]
    BadChunkSize(usize),
    #[error("image needs {0} chunks, more than a frame can carry")]
    TooManyChunks(usize),
}
