//! Checksums for persisted catalogues
//!
//! A stored catalogue whose checksum no longer matches was edited outside
//! the migration engine.

use sha2::{Digest, Sha256};

/// SHA-256 of the content, hex encoded
pub fn compute_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
