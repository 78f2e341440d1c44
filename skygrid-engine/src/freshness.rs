//! Database freshness at startup.
//!
//! The decision "rebuild or reuse the on-disk database" happens exactly
//! once, before serving begins, by comparing a freshly computed identity
//! hash against the hash persisted in the database header. The outcome is
//! an explicit state, not control flow scattered through startup code.

use skygrid_core::{BuildIdentity, Database};
use std::path::Path;

/// Freshness of the persisted database relative to a build identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    /// No database file exists (or it is unreadable enough that it may as
    /// well not).
    NoDatabase,

    /// A database exists but was built from a different identity, or the
    /// current identity is dirty and can never be trusted as fresh.
    Stale {
        /// Content hash found on disk, when the header was readable.
        persisted: Option<String>,
    },

    /// The persisted database matches the identity; reuse it.
    Fresh,
}

impl Freshness {
    /// Whether a rebuild is needed.
    pub fn needs_rebuild(&self) -> bool {
        !matches!(self, Freshness::Fresh)
    }
}

/// Assess the freshness of the database at `path` for `identity`.
///
/// A dirty identity is never fresh: locally modified data must always be
/// re-ingested, even when the revision identifiers match.
pub fn assess(path: &Path, identity: &BuildIdentity) -> Freshness {
    if !path.exists() {
        return Freshness::NoDatabase;
    }
    match Database::inspect(path) {
        Ok(info) => {
            if identity.dirty {
                tracing::info!(
                    persisted = %info.content_hash,
                    "Data has local modifications; forcing rebuild"
                );
                Freshness::Stale {
                    persisted: Some(info.content_hash),
                }
            } else if info.content_hash == identity.content_hash() {
                Freshness::Fresh
            } else {
                Freshness::Stale {
                    persisted: Some(info.content_hash),
                }
            }
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Existing database is unreadable; treating as stale"
            );
            Freshness::Stale { persisted: None }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skygrid_core::{CoverageIndex, DatabaseImage, FieldSchema};

    fn write_db(path: &Path, content_hash: &str) {
        let schema: FieldSchema =
            serde_json::from_value(serde_json::json!({"fields": []})).unwrap();
        DatabaseImage {
            content_hash: content_hash.to_string(),
            schema,
            extra_info: serde_json::Value::Null,
            coverage_order: 3,
            features: Vec::new(),
            index: CoverageIndex::default(),
        }
        .write(path)
        .unwrap();
    }

    #[test]
    fn test_missing_file_is_no_database() {
        let dir = tempfile::tempdir().unwrap();
        let identity = BuildIdentity::new("d", "c");
        assert_eq!(
            assess(&dir.path().join("missing.db"), &identity),
            Freshness::NoDatabase
        );
    }

    #[test]
    fn test_matching_hash_is_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("survey.db");
        let identity = BuildIdentity::new("d", "c");
        write_db(&path, &identity.content_hash());
        assert_eq!(assess(&path, &identity), Freshness::Fresh);
    }

    #[test]
    fn test_mismatched_hash_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("survey.db");
        let old = BuildIdentity::new("old", "c");
        write_db(&path, &old.content_hash());

        let current = BuildIdentity::new("new", "c");
        assert_eq!(
            assess(&path, &current),
            Freshness::Stale {
                persisted: Some(old.content_hash())
            }
        );
    }

    #[test]
    fn test_dirty_identity_is_never_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("survey.db");
        let identity = BuildIdentity::new("d", "c").with_dirty(true);
        write_db(&path, &identity.content_hash());
        assert!(assess(&path, &identity).needs_rebuild());
    }

    #[test]
    fn test_corrupt_file_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("survey.db");
        std::fs::write(&path, b"not a database").unwrap();
        assert_eq!(
            assess(&path, &BuildIdentity::new("d", "c")),
            Freshness::Stale { persisted: None }
        );
    }
}
