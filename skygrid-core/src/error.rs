//! Error types for the core data model and database container.

use thiserror::Error;

/// Database container and data-model errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// IO error during container read/write.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Container format error (bad magic, version, checksum, truncation).
    #[error("Database format error: {0}")]
    Format(String),

    /// The container decoded but its contents are inconsistent.
    #[error("Corrupt database: {0}")]
    Corrupt(String),

    /// Schema configuration error (unreadable or invalid `config.json`).
    #[error("Schema config error: {0}")]
    SchemaConfig(String),

    /// GeoJSON geometry error.
    #[error("Geometry error: {0}")]
    Geometry(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;
