//! Integrity: SHA-256 digest of a whole frame, logged by sender and receiver for comparison.
//! Not carried on the wire.

use sha2::{Digest, Sha256};

/// Hash a frame's bytes. Returns 32-byte digest.
pub fn frame_digest(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Lowercase hex of the digest's first 8 bytes, for log lines.
pub fn short_digest(bytes: &[u8]) -> String {
    frame_digest(bytes)[..8]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
