//! Content hashing for integrity verification
//!
//! The same digest function covers file contents and basket headers.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Width of a content digest in bytes
pub const HASH_SIZE: usize = 32;

/// Fixed-width digest of a byte range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ContentHash(pub [u8; HASH_SIZE]);

impl ContentHash {
    pub const ZERO: ContentHash = ContentHash([0; HASH_SIZE]);

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }
}

/// Digest function used for integrity checks
pub trait ContentHasher: Send {
    fn digest(&self, bytes: &[u8]) -> ContentHash;
}

/// SHA-256 hasher (the default)
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl ContentHasher for Sha256Hasher {
    fn digest(&self, bytes: &[u8]) -> ContentHash {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        ContentHash(hasher.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        let hash = Sha256Hasher.digest(b"abc");
        assert_eq!(
            hash.0[..4],
            [0xba, 0x78, 0x16, 0xbf],
            "sha256(\"abc\") prefix"
        );
    }

    #[test]
    fn test_different_inputs_differ() {
        assert_ne!(Sha256Hasher.digest(b"one"), Sha256Hasher.digest(b"two"));
        assert_ne!(Sha256Hasher.digest(b""), ContentHash::ZERO);
    }
}
