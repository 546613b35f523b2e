//! Frame header codec: fixed 16-byte big-endian prefix on every image datagram.
//!
//! Layout: magic u16, version u8, flags u8, frame_id u32, chunk_id u16,
//! total_chunks u16, payload_len u16, reserved u16.

use crate::protocol::{HEADER_SIZE, MAGIC, VERSION};

/// Header carried at the start of every image datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub magic: u16,
    pub version: u8,
    /// Reserved bitfield; not checked on receive.
    pub flags: u8,
    pub frame_id: u32,
    pub chunk_id: u16,
    pub total_chunks: u16,
    pub payload_len: u16,
    pub reserved: u16,
}

impl FrameHeader {
    /// Header for one chunk with the current magic and version, flags and reserved zeroed.
    pub fn new(frame_id: u32, chunk_id: u16, total_chunks: u16, payload_len: u16) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            flags: 0,
            frame_id,
            chunk_id,
            total_chunks,
            payload_len,
            reserved: 0,
        }
    }

    /// True if magic and version match this protocol.
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC && self.version == VERSION
    }
}

/// Encode a header into its fixed wire layout.
pub fn encode_header(h: &FrameHeader) -> [u8; HEADER_SIZE] {
    let mut out = [0u8; HEADER_SIZE];
    out[0..2].copy_from_slice(&h.magic.to_be_bytes());
    out[2] = h.version;
    out[3] = h.flags;
    out[4..8].copy_from_slice(&h.frame_id.to_be_bytes());
    out[8..10].copy_from_slice(&h.chunk_id.to_be_bytes());
    out[10..12].copy_from_slice(&h.total_chunks.to_be_bytes());
    out[12..14].copy_from_slice(&h.payload_len.to_be_bytes());
    out[14..16].copy_from_slice(&h.reserved.to_be_bytes());
    out
}

/// Decode the header at the front of `bytes`. Magic and version are not checked here.
pub fn decode_header(bytes: &[u8]) -> Result<FrameHeader, HeaderDecodeError> {
    if bytes.len() < HEADER_SIZE {
        return Err(HeaderDecodeError::TooShort(bytes.len()));
    }
    let be16 = |i: usize| u16::from_be_bytes([bytes[i], bytes[i + 1]]);
    Ok(FrameHeader {
        magic: be16(0),
        version: bytes[2],
        flags: bytes[3],
        frame_id: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        chunk_id: be16(8),
        total_chunks: be16(10),
        payload_len: be16(12),
        reserved: be16(14),
    })
}

/// Error decoding a frame header.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderDecodeError {
    #[error("datagram too short for header: {0} bytes")]
    TooShort(usize),
}

/// Build a full datagram: header followed by payload. `payload_len` is taken from the header.
pub fn encode_datagram(h: &FrameHeader, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(&encode_header(h));
    out.extend_from_slice(payload);
    out
}

/// Split a datagram into header and payload without validating magic/version.
/// The payload is whatever follows the header; callers compare it with `payload_len`.
pub fn split_datagram(bytes: &[u8]) -> Result<(FrameHeader, &[u8]), HeaderDecodeError> {
    let header = decode_header(bytes)?;
    Ok((header, &bytes[HEADER_SIZE..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_big_endian() {
        let h = FrameHeader {
            magic: MAGIC,
            version: VERSION,
            flags: 0x5a,
            frame_id: 0x0102_0304,
            chunk_id: 0x0506,
            total_chunks: 0x0708,
            payload_len: 0x090a,
            reserved: 0x0b0c,
        };
        assert_eq!(
            encode_header(&h),
            [0xca, 0xfe, 1, 0x5a, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]
        );
    }

    #[test]
    fn roundtrip_with_payload() {
        let payload = b"jpeg bytes";
        let h = FrameHeader::new(42, 3, 9, payload.len() as u16);
        let dgram = encode_datagram(&h, payload);
        let (decoded, rest) = split_datagram(&dgram).unwrap();
        assert_eq!(decoded, h);
        assert_eq!(rest, payload);
    }

    #[test]
    fn short_input_rejected() {
        let h = encode_header(&FrameHeader::new(1, 0, 1, 0));
        assert_eq!(
            decode_header(&h[..HEADER_SIZE - 1]),
            Err(HeaderDecodeError::TooShort(15))
        );
        assert!(decode_header(&[]).is_err());
    }

    #[test]
    fn decode_does_not_validate() {
        let mut bytes = encode_header(&FrameHeader::new(1, 0, 1, 0));
        bytes[0] = 0xbe;
        bytes[2] = 7;
        let h = decode_header(&bytes).unwrap();
        assert_eq!(h.magic, 0xbefe);
        assert!(!h.is_valid());
    }
}
