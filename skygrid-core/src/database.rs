//! The on-disk database container and read-only handle.
//!
//! A built database is one file:
//!
//! ```text
//! SGD1 (skygrid database v1)
//!
//! Header:
//!   magic: "SGD1" (4B)
//!   version: u8
//!   flags: u8
//!   _reserved: u16
//!   info_len: u32 (LE)
//!   info_json: [u8; info_len]      -- DatabaseInfo, uncompressed
//!   compressed_len: u32 (LE)
//!   crc32_compressed: u32 (LE)     -- CRC32 of compressed body
//!   crc32_uncompressed: u32 (LE)   -- CRC32 of the JSON image
//!
//! Body (zstd compressed):
//!   DatabaseImage as JSON
//! ```
//!
//! The info block is readable without decompression, so callers can decide
//! whether a rebuild is needed before paying for a full open. Everything in
//! the image is deterministic for a given input, so identical builds produce
//! byte-identical files.
//!
//! The handle is single-writer-at-build, multi-reader-at-serve: `open`
//! returns an immutable value, shared behind `Arc` with no locking.

use crate::error::{DatabaseError, Result};
use crate::feature::Feature;
use crate::index::CoverageIndex;
use crate::schema::FieldSchema;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// Magic bytes for database files.
pub const DATABASE_MAGIC: &[u8; 4] = b"SGD1";

/// Current container format version.
pub const DATABASE_VERSION: u8 = 1;

/// zstd compression level for the body.
const ZSTD_LEVEL: i32 = 3;

/// Header-only summary of a database file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseInfo {
    /// Content hash the database was built with.
    pub content_hash: String,

    /// Number of features in the database.
    pub feature_count: u64,

    /// Coverage order of the cell index.
    pub coverage_order: u8,

    /// Container format version.
    pub format_version: u32,
}

/// The complete persisted image of a database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseImage {
    /// Content hash the database was built with.
    pub content_hash: String,

    /// Field schema and presentation config, served verbatim.
    pub schema: FieldSchema,

    /// Free-form metadata recorded at build time (caller identity info,
    /// build statistics). Served verbatim.
    pub extra_info: serde_json::Value,

    /// Order of the precomputed coverage cells.
    pub coverage_order: u8,

    /// All features, in id order.
    pub features: Vec<Feature>,

    /// Sorted cell→feature index.
    pub index: CoverageIndex,
}

/// A read-only handle over an opened database.
#[derive(Debug)]
pub struct Database {
    image: DatabaseImage,
}

impl Database {
    /// Open a database file, verifying magic, version and checksums.
    pub fn open(path: &Path) -> Result<Database> {
        let data = std::fs::read(path)?;
        let image = decode_image(&data)?;
        if image.features.len() > u32::MAX as usize {
            return Err(DatabaseError::Corrupt("feature count exceeds u32".into()));
        }
        tracing::debug!(
            path = %path.display(),
            content_hash = %image.content_hash,
            features = image.features.len(),
            "Opened database"
        );
        Ok(Database { image })
    }

    /// Read only the header info block, without decompressing the body.
    pub fn inspect(path: &Path) -> Result<DatabaseInfo> {
        let data = std::fs::read(path)?;
        let (info, _) = decode_header(&data)?;
        Ok(info)
    }

    /// The content hash this database was built with.
    pub fn content_hash(&self) -> &str {
        &self.image.content_hash
    }

    /// The field schema and presentation config.
    pub fn schema(&self) -> &FieldSchema {
        &self.image.schema
    }

    /// Free-form build metadata.
    pub fn extra_info(&self) -> &serde_json::Value {
        &self.image.extra_info
    }

    /// Coverage order of the cell index.
    pub fn coverage_order(&self) -> u8 {
        self.image.coverage_order
    }

    /// All features, in id order.
    pub fn features(&self) -> &[Feature] {
        &self.image.features
    }

    /// Look up a feature by id.
    pub fn feature(&self, id: u32) -> Option<&Feature> {
        self.image.features.get(id as usize)
    }

    /// The coverage index.
    pub fn index(&self) -> &CoverageIndex {
        &self.image.index
    }
}

impl DatabaseImage {
    /// Persist the image to `path`.
    ///
    /// Writes to a sibling temp file and renames, so a crash mid-write
    /// never replaces or corrupts a previously valid database.
    pub fn write(&self, path: &Path) -> Result<()> {
        let bytes = encode_image(self)?;
        let tmp_path = path.with_extension("tmp");
        {
            let mut tmp = std::fs::File::create(&tmp_path)?;
            tmp.write_all(&bytes)?;
            tmp.sync_all()?;
        }
        std::fs::rename(&tmp_path, path)?;
        tracing::info!(
            path = %path.display(),
            content_hash = %self.content_hash,
            features = self.features.len(),
            bytes = bytes.len(),
            "Wrote database"
        );
        Ok(())
    }

    fn info(&self) -> DatabaseInfo {
        DatabaseInfo {
            content_hash: self.content_hash.clone(),
            feature_count: self.features.len() as u64,
            coverage_order: self.coverage_order,
            format_version: DATABASE_VERSION as u32,
        }
    }
}

fn encode_image(image: &DatabaseImage) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(image)
        .map_err(|e| DatabaseError::Format(format!("image encode: {e}")))?;
    let crc32_uncompressed = crc32fast::hash(&body);

    let compressed = zstd::encode_all(&body[..], ZSTD_LEVEL)
        .map_err(|e| DatabaseError::Io(std::io::Error::other(e)))?;
    let crc32_compressed = crc32fast::hash(&compressed);

    let info = serde_json::to_vec(&image.info())
        .map_err(|e| DatabaseError::Format(format!("info encode: {e}")))?;

    let mut buf = Vec::with_capacity(24 + info.len() + compressed.len());
    buf.extend_from_slice(DATABASE_MAGIC);
    buf.push(DATABASE_VERSION);
    buf.push(0); // flags
    buf.extend_from_slice(&[0u8; 2]); // reserved
    buf.extend_from_slice(&(info.len() as u32).to_le_bytes());
    buf.extend_from_slice(&info);
    buf.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
    buf.extend_from_slice(&crc32_compressed.to_le_bytes());
    buf.extend_from_slice(&crc32_uncompressed.to_le_bytes());
    buf.extend_from_slice(&compressed);
    Ok(buf)
}

/// Decode the header, returning the info block and the offset of the
/// compressed-length field.
fn decode_header(data: &[u8]) -> Result<(DatabaseInfo, usize)> {
    if data.len() < 12 {
        return Err(DatabaseError::Format("file too short".into()));
    }
    if &data[0..4] != DATABASE_MAGIC {
        return Err(DatabaseError::Format("invalid magic".into()));
    }
    let version = data[4];
    if version != DATABASE_VERSION {
        return Err(DatabaseError::Format(format!(
            "unsupported version: {version} (only v{DATABASE_VERSION} supported)"
        )));
    }
    let info_len = u32::from_le_bytes(data[8..12].try_into().unwrap()) as usize;
    if data.len() < 12 + info_len {
        return Err(DatabaseError::Format("truncated info block".into()));
    }
    let info: DatabaseInfo = serde_json::from_slice(&data[12..12 + info_len])
        .map_err(|e| DatabaseError::Format(format!("info decode: {e}")))?;
    Ok((info, 12 + info_len))
}

fn decode_image(data: &[u8]) -> Result<DatabaseImage> {
    let (_, pos) = decode_header(data)?;
    if data.len() < pos + 12 {
        return Err(DatabaseError::Format("truncated body header".into()));
    }
    let compressed_len = u32::from_le_bytes(data[pos..pos + 4].try_into().unwrap()) as usize;
    let expected_crc_c = u32::from_le_bytes(data[pos + 4..pos + 8].try_into().unwrap());
    let expected_crc_u = u32::from_le_bytes(data[pos + 8..pos + 12].try_into().unwrap());

    let body_start = pos + 12;
    if data.len() < body_start + compressed_len {
        return Err(DatabaseError::Format("truncated body".into()));
    }
    let compressed = &data[body_start..body_start + compressed_len];

    let actual_crc_c = crc32fast::hash(compressed);
    if actual_crc_c != expected_crc_c {
        return Err(DatabaseError::Format(format!(
            "compressed CRC32 mismatch: expected {expected_crc_c:08x}, got {actual_crc_c:08x}"
        )));
    }

    let body =
        zstd::decode_all(compressed).map_err(|e| DatabaseError::Io(std::io::Error::other(e)))?;

    let actual_crc_u = crc32fast::hash(&body);
    if actual_crc_u != expected_crc_u {
        return Err(DatabaseError::Format(format!(
            "uncompressed CRC32 mismatch: expected {expected_crc_u:08x}, got {actual_crc_u:08x}"
        )));
    }

    serde_json::from_slice(&body).map_err(|e| DatabaseError::Format(format!("image decode: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::CellEntry;

    fn sample_image() -> DatabaseImage {
        let schema: FieldSchema = serde_json::from_value(serde_json::json!({
            "fields": [{"name": "telescope", "type": "string"}]
        }))
        .unwrap();
        DatabaseImage {
            content_hash: "abcdef0123456789".into(),
            schema,
            extra_info: serde_json::json!({"builder": "test"}),
            coverage_order: 3,
            features: Vec::new(),
            index: CoverageIndex::from_entries(vec![CellEntry { cell: 1, feature: 0 }]),
        }
    }

    #[test]
    fn test_write_open_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("survey.db");

        sample_image().write(&path).unwrap();
        let db = Database::open(&path).unwrap();
        assert_eq!(db.content_hash(), "abcdef0123456789");
        assert_eq!(db.coverage_order(), 3);
        assert_eq!(db.index().len(), 1);
    }

    #[test]
    fn test_inspect_reads_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("survey.db");

        sample_image().write(&path).unwrap();
        let info = Database::inspect(&path).unwrap();
        assert_eq!(info.content_hash, "abcdef0123456789");
        assert_eq!(info.feature_count, 0);
        assert_eq!(info.coverage_order, 3);
    }

    #[test]
    fn test_open_rejects_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("survey.db");
        std::fs::write(&path, b"NOPE0000000000000000").unwrap();
        assert!(matches!(
            Database::open(&path),
            Err(DatabaseError::Format(_))
        ));
    }

    #[test]
    fn test_open_rejects_corrupted_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("survey.db");
        sample_image().write(&path).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        std::fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            Database::open(&path),
            Err(DatabaseError::Format(_)) | Err(DatabaseError::Io(_))
        ));
    }

    #[test]
    fn test_identical_images_produce_identical_bytes() {
        let a = encode_image(&sample_image()).unwrap();
        let b = encode_image(&sample_image()).unwrap();
        assert_eq!(a, b);
    }
}
