//! Core data model and database container for skygrid.
//!
//! skygrid turns collections of astronomical survey footprints into an
//! immutable, content-hashed spatial database and serves attribute-filtered
//! geometry as hierarchical sky tiles. This crate holds the pieces every
//! other layer depends on:
//!
//! - [`value`]: scalar attribute values
//! - [`schema`]: field schema and presentation configuration
//! - [`feature`]: footprint features and their GeoJSON encoding
//! - [`index`]: the sorted cell→feature coverage index
//! - [`content_hash`]: build identities and content hashing
//! - [`database`]: the on-disk container and read-only handle
//! - [`error`]: error types
//!
//! The database is single-writer-at-build, multi-reader-at-serve: once a
//! [`database::Database`] is opened it is immutable and can be shared across
//! worker tasks behind `Arc` without locking.

pub mod content_hash;
pub mod database;
pub mod error;
pub mod feature;
pub mod index;
pub mod schema;
pub mod value;

pub use content_hash::{hash_payload, BuildIdentity, CONTENT_HASH_LEN};
pub use database::{Database, DatabaseImage, DatabaseInfo};
pub use error::{DatabaseError, Result};
pub use feature::Feature;
pub use index::{CellEntry, CoverageIndex};
pub use schema::{DerivedSource, FieldDecl, FieldSchema, FieldType};
pub use value::Value;
