//! Content-addressed integrity.
//!
//! Every artifact is content-addressed via SHA-256 over the canonical JSON
//! of its content view. Lifecycle fields (publication, downloads,
//! deprecation, signature) are not part of the content, so they can change
//! without invalidating the digest.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A content hash (SHA-256 hex digest).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Compute the SHA-256 hash of the given data.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentHash(hex::encode(hasher.finalize()))
    }

    /// Hash the JSON serialization of a value.
    ///
    /// Struct fields serialize in declaration order and maps in this crate
    /// are `BTreeMap`s, so the encoding is canonical for our record types.
    pub fn of_json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(ContentHash::compute(&serde_json::to_vec(value)?))
    }

    /// Get the hex string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
