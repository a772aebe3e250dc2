//! Checksum utilities for document content

use sha2::{Digest, Sha256};

/// Hex SHA-256 digest of a document body
pub fn content_checksum(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}
