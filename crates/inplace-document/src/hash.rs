//! Content hashing for canonical document bytes
//!
//! Provides [`ContentHash`], a 32-byte Blake3 digest of a document's
//! canonical serialized form.

use std::fmt::{self, Display, Formatter};

/// A 32-byte content hash (Blake3)
///
/// Recomputed whenever a document's canonical bytes change, so two documents
/// with equal hashes are byte-for-byte identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Compute Blake3 hash of arbitrary data
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Short string representation (first 16 hex chars), used in log fields
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}
