//! # Content Digests
//!
//! SHA-256 over [`CanonicalBytes`]. Accepting only canonical bytes means
//! every identifier derived here is independent of field order and
//! formatting of the input.

use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;

/// Compute a lowercase SHA-256 hex string from canonical bytes.
pub fn sha256_hex(data: &CanonicalBytes) -> String {
    let hash = Sha256::digest(data.as_bytes());
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

/// The first `len` hex characters of the SHA-256 digest.
///
/// Used for short, human-scannable identifiers. `len` is capped at 64.
pub fn short_digest(data: &CanonicalBytes, len: usize) -> String {
    let mut hex = sha256_hex(data);
    hex.truncate(len.min(64));
    hex
}
