//! Content hashing of database identities.
//!
//! A database snapshot is identified by a hash over the data revision and
//! the engine code revision. The hash is deterministic for a given identity
//! pair, so rebuilding from identical inputs reproduces the same hash and
//! cache-friendly URLs derived from it stay valid.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of a rendered content hash, in hex characters.
pub const CONTENT_HASH_LEN: usize = 16;

/// Identity of one database build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildIdentity {
    /// Revision identifier of the raw survey data (e.g. a VCS commit id).
    pub data_revision: String,

    /// Revision identifier of the engine code.
    pub code_revision: String,

    /// Whether the data tree carries local modifications. A dirty identity
    /// never compares fresh against a persisted hash, forcing a rebuild,
    /// but the hash itself stays deterministic.
    #[serde(default)]
    pub dirty: bool,
}

impl BuildIdentity {
    /// Create a clean identity.
    pub fn new(data_revision: impl Into<String>, code_revision: impl Into<String>) -> Self {
        Self {
            data_revision: data_revision.into(),
            code_revision: code_revision.into(),
            dirty: false,
        }
    }

    /// Mark the identity as locally modified.
    pub fn with_dirty(mut self, dirty: bool) -> Self {
        self.dirty = dirty;
        self
    }

    /// Compute the content hash for this identity.
    ///
    /// SHA-256 over a length-prefixed encoding of both revisions, rendered
    /// as the first [`CONTENT_HASH_LEN`] hex characters.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"skygrid-db:v1");
        hasher.update((self.data_revision.len() as u64).to_le_bytes());
        hasher.update(self.data_revision.as_bytes());
        hasher.update((self.code_revision.len() as u64).to_le_bytes());
        hasher.update(self.code_revision.as_bytes());
        let digest = hasher.finalize();
        hex::encode(digest)[..CONTENT_HASH_LEN].to_string()
    }
}

/// Hash an arbitrary payload into the same rendered form as content hashes.
///
/// Used for query hashes, which share the address space convention.
pub fn hash_payload(payload: &[u8]) -> String {
    let digest = Sha256::digest(payload);
    hex::encode(digest)[..CONTENT_HASH_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        let a = BuildIdentity::new("rev-a", "code-1");
        let b = BuildIdentity::new("rev-a", "code-1");
        assert_eq!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash().len(), CONTENT_HASH_LEN);
    }

    #[test]
    fn test_hash_depends_on_both_revisions() {
        let base = BuildIdentity::new("rev-a", "code-1");
        assert_ne!(
            base.content_hash(),
            BuildIdentity::new("rev-b", "code-1").content_hash()
        );
        assert_ne!(
            base.content_hash(),
            BuildIdentity::new("rev-a", "code-2").content_hash()
        );
    }

    #[test]
    fn test_dirty_does_not_change_hash() {
        let clean = BuildIdentity::new("rev-a", "code-1");
        let dirty = clean.clone().with_dirty(true);
        assert_eq!(clean.content_hash(), dirty.content_hash());
    }

    #[test]
    fn test_length_prefix_disambiguates() {
        // "ab" + "c" must not collide with "a" + "bc".
        let x = BuildIdentity::new("ab", "c");
        let y = BuildIdentity::new("a", "bc");
        assert_ne!(x.content_hash(), y.content_hash());
    }
}
