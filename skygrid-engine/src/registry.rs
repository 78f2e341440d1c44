//! Process-wide query registry.
//!
//! Maps query hashes to the specs that produced them, so later tile
//! requests can carry an opaque hash instead of the full spec. The registry
//! is explicitly owned and injected into the engine — not a global — and is
//! the only shared mutable state in the serving path.
//!
//! Retention is unbounded for the process lifetime, a declared choice: the
//! registry holds one entry per distinct (spec, database) pair and entries
//! are small. Nothing is persisted; after a restart every hash resolves to
//! not-found and callers must re-register.
//!
//! Insertion is at-most-once per hash. Two genuinely distinct specs
//! colliding on a hash is an accepted risk of the address space; the first
//! stored spec wins and the collision is ignored.

use skygrid_query::Query;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A registered query: the spec as submitted plus its parsed form.
#[derive(Debug, Clone)]
pub struct StoredQuery {
    /// The spec exactly as the caller submitted it.
    pub spec: serde_json::Value,

    /// The validated predicate tree and aggregations.
    pub query: Arc<Query>,
}

/// Registry of hash → query for the process lifetime.
#[derive(Debug, Default)]
pub struct QueryRegistry {
    entries: RwLock<HashMap<String, StoredQuery>>,
}

impl QueryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a query under its hash, unless the hash is already taken.
    pub fn insert(&self, hash: &str, spec: serde_json::Value, query: Arc<Query>) {
        if let Ok(mut entries) = self.entries.write() {
            entries
                .entry(hash.to_string())
                .or_insert(StoredQuery { spec, query });
        }
    }

    /// Resolve a hash to a defensive copy of the stored spec.
    pub fn resolve(&self, hash: &str) -> Option<serde_json::Value> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(hash).map(|s| s.spec.clone()))
    }

    /// Resolve a hash to the parsed query.
    pub fn resolve_parsed(&self, hash: &str) -> Option<Arc<Query>> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(hash).map(|s| s.query.clone()))
    }

    /// Number of registered queries.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
