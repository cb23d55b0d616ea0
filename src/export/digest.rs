//! Content digests for exported flat files.

use std::path::Path;

use sha2::{Digest, Sha256};

/// SHA-256 of a byte buffer as 64 lowercase hex characters.
pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// SHA-256 of a file's contents.
pub fn file_digest(path: impl AsRef<Path>) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(digest_bytes(&bytes))
}
