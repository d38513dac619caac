//! Content-addressed cache keys.
//!
//! A key is the SHA-256 digest of the raw UTF-8 bytes of the input, rendered as 64 lowercase
//! hex characters. No trimming or normalization happens here: byte-different inputs are
//! distinct cache subjects.

use std::fmt;

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest used as a store key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives the cache key for `text`. Pure and infallible; the empty string is a valid input.
pub fn derive_cache_key(text: &str) -> CacheKey {
    CacheKey(hex::encode(Sha256::digest(text.as_bytes())))
}
