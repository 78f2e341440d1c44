//! Error types for the engine layer.
//!
//! The taxonomy follows the serving contract: ingest errors abort a build
//! and nothing else; query errors are client rejections; not-found is an
//! expected outcome modeled as `Ok(None)` at the API, never an error; and
//! internal errors are isolated to the single request that hit them.

use std::path::PathBuf;
use thiserror::Error;

/// Ingestion errors. All of these are fatal for the build in progress and
/// leave any previously valid database untouched. Malformed individual
/// features are *not* errors; they are skipped, warned about and counted.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The input directory cannot be read.
    #[error("Unreadable input directory {path}: {source}")]
    UnreadableInput {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The schema config is missing or invalid.
    #[error("Schema config: {0}")]
    Config(skygrid_core::DatabaseError),

    /// A collection file listed by the directory cannot be read.
    #[error("Unreadable collection {path}: {source}")]
    UnreadableCollection {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Covering computation failed.
    #[error("Covering: {0}")]
    Covering(#[from] skygrid_healpix::HealpixError),

    /// Writing the database file failed.
    #[error("Database write: {0}")]
    Write(skygrid_core::DatabaseError),
}

/// Engine errors surfaced by the facade.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Database open/read failure.
    #[error("Database: {0}")]
    Database(#[from] skygrid_core::DatabaseError),

    /// Client-facing query rejection.
    #[error("Query: {0}")]
    Query(#[from] skygrid_query::QueryError),

    /// Build failure.
    #[error("Ingest: {0}")]
    Ingest(#[from] IngestError),

    /// A request exceeded its wall-clock bound.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Failure inside a single computation (including a worker panic).
    /// Isolated to the request; the serving process keeps going.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
