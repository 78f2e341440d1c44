//! Filter parsing, canonicalization, hashing and evaluation for skygrid.
//!
//! Callers describe what they want as a JSON filter/aggregation spec; this
//! crate turns the spec into a validated predicate tree ([`filter`]),
//! collapses structurally equivalent specs into one canonical form bound to
//! a database hash ([`canonical`]), and evaluates the tree over feature
//! sets ([`eval`]). Malformed specs and unknown fields are client errors
//! ([`error`]), never process failures.

pub mod canonical;
pub mod error;
pub mod eval;
pub mod filter;

pub use canonical::{canonical_query, query_hash};
pub use error::{QueryError, Result};
pub use eval::{evaluate, matching_ids, AggregateOutput, QueryOutput, VALUE_COUNTS_CAP};
pub use filter::{Aggregation, CompareOp, FilterNode, Query};
