//! Deterministic content hashes used to name media files.

use sha2::{Digest, Sha256};

/// Returns the first `hex_chars` hex characters of the SHA256 of `input`.
///
/// `hex_chars` is capped at 64 (the full digest).
pub fn content_hash(input: &str, hex_chars: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let mut encoded = hex::encode(hasher.finalize());
    encoded.truncate(hex_chars.min(64));
    encoded
}
