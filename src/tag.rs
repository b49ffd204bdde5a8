//! Tags: the only external handle to a basket or a file
//!
//! A tag is a 128-bit identifier. Tags are drawn from a [`TagGenerator`];
//! the default generator uses a CSPRNG so collisions are not a practical concern.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of a tag in bytes
pub const TAG_SIZE: usize = 16;

/// Globally unique identifier for a basket or a file
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Tag([u8; TAG_SIZE]);

impl Tag {
    /// The all-zero tag, used for empty slots
    pub const NIL: Tag = Tag([0; TAG_SIZE]);

    pub const fn from_bytes(bytes: [u8; TAG_SIZE]) -> Self {
        Tag(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; TAG_SIZE] {
        &self.0
    }

    pub fn is_nil(&self) -> bool {
        self.0 == [0; TAG_SIZE]
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self)
    }
}

/// Source of fresh tags
pub trait TagGenerator: Send {
    /// Produce a tag that has never been handed out before
    fn new_tag(&mut self) -> Tag;
}

/// Tag generator backed by a seedable RNG
pub struct RandomTagGenerator {
    rng: StdRng,
}

impl RandomTagGenerator {
    /// Generator seeded from OS entropy
    pub fn new() -> Self {
        RandomTagGenerator {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic generator for reproducible runs
    pub fn with_seed(seed: u64) -> Self {
        RandomTagGenerator {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomTagGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TagGenerator for RandomTagGenerator {
    fn new_tag(&mut self) -> Tag {
        let mut bytes = [0u8; TAG_SIZE];
        // The nil tag marks empty slots and must never be issued
        while bytes == [0; TAG_SIZE] {
            self.rng.fill_bytes(&mut bytes);
        }
        Tag(bytes)
    }
}
