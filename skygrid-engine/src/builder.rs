//! Ingestion: raw feature collections → on-disk database.
//!
//! The builder walks a data directory (`config.json` plus `*.geojson`
//! collections, processed in lexicographic filename order so ids are
//! stable), normalizes each footprint, computes schema-declared derived
//! fields, precomputes per-feature cell coverings, and writes the database
//! container atomically.
//!
//! Failure policy: an unreadable directory, config or collection file
//! aborts the build and leaves any previously valid database untouched.
//! A malformed individual feature is skipped with a warning and counted —
//! one bad footprint must not sink a survey.

use crate::config::BuildOptions;
use crate::error::IngestError;
use chrono::{DateTime, NaiveDate};
use geo::{Area, Centroid};
use serde::Serialize;
use skygrid_core::{
    feature::{footprint_from_geojson, normalize_footprint},
    BuildIdentity, CellEntry, CoverageIndex, DatabaseImage, Feature, FieldSchema, FieldType,
    DerivedSource, Value,
};
use skygrid_healpix::{covering, CellGeometry};
use std::collections::BTreeMap;
use std::path::Path;

/// Statistics collected during a build.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildStats {
    /// Collection files processed.
    pub collections: u64,

    /// Collection files skipped (unparsable JSON or missing features).
    pub collections_skipped: u64,

    /// Feature entries processed.
    pub records_processed: u64,

    /// Features ingested.
    pub features_added: u64,

    /// Feature entries skipped (bad geometry, bad field value, ...).
    pub records_skipped: u64,

    /// Total coverage index entries.
    pub cell_entries: u64,
}

/// Result of a successful build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Content hash the database was built with.
    pub content_hash: String,

    /// Build statistics.
    pub stats: BuildStats,
}

/// Build a database from `data_dir` into `out_path`.
///
/// `server_info` is recorded verbatim in the database's extra info for the
/// surrounding layer to serve back. Idempotent: identical inputs and
/// identity produce a byte-identical database file.
pub fn build(
    data_dir: &Path,
    out_path: &Path,
    identity: &BuildIdentity,
    server_info: &serde_json::Value,
    options: &BuildOptions,
    geom: &dyn CellGeometry,
) -> Result<BuildReport, IngestError> {
    let content_hash = identity.content_hash();
    tracing::info!(
        data_dir = %data_dir.display(),
        content_hash = %content_hash,
        coverage_order = options.coverage_order,
        "Building database"
    );

    let schema =
        FieldSchema::load(&data_dir.join("config.json")).map_err(IngestError::Config)?;

    let mut collection_paths: Vec<std::path::PathBuf> = std::fs::read_dir(data_dir)
        .map_err(|source| IngestError::UnreadableInput {
            path: data_dir.to_path_buf(),
            source,
        })?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| IngestError::UnreadableInput {
            path: data_dir.to_path_buf(),
            source,
        })?
        .into_iter()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "geojson"))
        .collect();
    collection_paths.sort();

    let mut stats = BuildStats::default();
    let mut features: Vec<Feature> = Vec::new();
    let mut entries: Vec<CellEntry> = Vec::new();

    for path in &collection_paths {
        let text = std::fs::read_to_string(path).map_err(|source| {
            IngestError::UnreadableCollection {
                path: path.clone(),
                source,
            }
        })?;
        let collection: serde_json::Value = match serde_json::from_str(&text) {
            Ok(json) => json,
            Err(e) => {
                stats.collections_skipped += 1;
                tracing::warn!(path = %path.display(), error = %e, "Skipping unparsable collection");
                continue;
            }
        };
        let Some(raw_features) = collection.get("features").and_then(|f| f.as_array()) else {
            stats.collections_skipped += 1;
            tracing::warn!(path = %path.display(), "Skipping collection without features array");
            continue;
        };

        stats.collections += 1;
        for raw in raw_features {
            stats.records_processed += 1;
            let id = features.len() as u64;
            match ingest_feature(raw, id, &schema, options.coverage_order, geom)? {
                Some(feature) => {
                    stats.cell_entries += feature.coverage.len() as u64;
                    for &cell in &feature.coverage {
                        entries.push(CellEntry {
                            cell,
                            feature: id as u32,
                        });
                    }
                    features.push(feature);
                    stats.features_added += 1;
                }
                None => {
                    stats.records_skipped += 1;
                }
            }
        }
        tracing::debug!(
            path = %path.display(),
            features = features.len(),
            "Processed collection"
        );
    }

    let extra_info = serde_json::json!({
        "content_hash": content_hash,
        "identity": identity,
        "server_info": server_info,
        "stats": stats,
    });

    let image = DatabaseImage {
        content_hash: content_hash.clone(),
        schema,
        extra_info,
        coverage_order: options.coverage_order,
        features,
        index: CoverageIndex::from_entries(entries),
    };
    image.write(out_path).map_err(IngestError::Write)?;

    tracing::info!(
        content_hash = %content_hash,
        features = stats.features_added,
        skipped = stats.records_skipped,
        cell_entries = stats.cell_entries,
        "Build finished"
    );
    Ok(BuildReport {
        content_hash,
        stats,
    })
}

/// Ingest one raw feature entry. `Ok(None)` means "skip it" — the warning
/// has already been logged.
fn ingest_feature(
    raw: &serde_json::Value,
    id: u64,
    schema: &FieldSchema,
    coverage_order: u8,
    geom: &dyn CellGeometry,
) -> Result<Option<Feature>, IngestError> {
    let Some(geometry) = raw.get("geometry") else {
        tracing::warn!(id, "Skipping feature without geometry");
        return Ok(None);
    };
    let footprint = match footprint_from_geojson(geometry) {
        Ok(fp) => fp,
        Err(e) => {
            tracing::warn!(id, error = %e, "Skipping feature with invalid geometry");
            return Ok(None);
        }
    };
    let Some(footprint) = normalize_footprint(footprint) else {
        tracing::warn!(id, "Skipping degenerate footprint");
        return Ok(None);
    };

    let raw_props = raw
        .get("properties")
        .and_then(|p| p.as_object())
        .cloned()
        .unwrap_or_default();

    let mut properties: BTreeMap<String, Value> = BTreeMap::new();
    for field in &schema.fields {
        if let Some(source) = field.derived {
            let value = match source {
                DerivedSource::Area => Some(footprint.unsigned_area()),
                DerivedSource::CentroidRa => footprint.centroid().map(|c| c.x()),
                DerivedSource::CentroidDec => footprint.centroid().map(|c| c.y()),
            };
            if let Some(v) = value {
                properties.insert(field.name.clone(), Value::Num(v));
            }
            continue;
        }

        let Some(raw_value) = raw_props.get(&field.name) else {
            continue;
        };
        if raw_value.is_null() {
            continue;
        }
        match coerce_value(raw_value, field.field_type) {
            Some(value) => {
                properties.insert(field.name.clone(), value);
            }
            None => {
                tracing::warn!(
                    id,
                    field = %field.name,
                    value = %raw_value,
                    "Skipping feature with uncoercible field value"
                );
                return Ok(None);
            }
        }
    }

    let coverage = covering(&footprint, coverage_order, geom)?;
    if coverage.is_empty() {
        tracing::warn!(id, "Skipping footprint with empty covering");
        return Ok(None);
    }

    Ok(Some(Feature {
        id,
        properties,
        footprint,
        coverage,
    }))
}

/// Coerce a raw JSON scalar to the declared field type.
fn coerce_value(raw: &serde_json::Value, field_type: FieldType) -> Option<Value> {
    let value = Value::from_json(raw)?;
    match (field_type, value) {
        (FieldType::String, Value::Str(s)) => Some(Value::Str(s)),
        (FieldType::String, Value::Num(n)) => Some(Value::Str(n.to_string())),
        (FieldType::Number, Value::Num(n)) => Some(Value::Num(n)),
        (FieldType::Number, Value::Str(_)) => None,
        // Dates normalize to epoch milliseconds; numbers are taken as
        // already-normalized.
        (FieldType::Date, Value::Num(n)) => Some(Value::Num(n)),
        (FieldType::Date, Value::Str(s)) => parse_date_millis(&s).map(Value::Num),
    }
}

/// Parse a date string to epoch milliseconds (RFC 3339 or `YYYY-MM-DD`).
fn parse_date_millis(s: &str) -> Option<f64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis() as f64);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis() as f64)
}
