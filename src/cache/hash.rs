//! Content hashing utilities for namespace keys.

use sha2::{Digest, Sha256};

/// Compute the SHA256 hash of `data`.
///
/// Returns a 64-character lowercase hexadecimal string.
pub fn compute_hash(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    format!("{:x}", hasher.finalize())
}
