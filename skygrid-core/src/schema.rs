//! Field schema and presentation configuration.
//!
//! The schema is loaded once from `config.json` in the data directory and
//! exposed read-only after ingestion. It declares the queryable fields,
//! their types, formatting rules (opaque expression strings evaluated by
//! the presentation layer, never by the engine), optional derived fields
//! computed from geometry at build time, and free-form presentation extras
//! that are served verbatim.

use crate::error::{DatabaseError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Declared type of a queryable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Free-text or categorical string.
    String,
    /// Numeric value.
    Number,
    /// Date; normalized to epoch milliseconds at ingestion.
    Date,
}

/// Geometry-derived field sources.
///
/// Derived fields are computed per feature at build time and stored like any
/// other attribute, so queries and aggregations see no difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedSource {
    /// Footprint area in square degrees (planar approximation on the sphere).
    Area,
    /// Right ascension of the footprint centroid, degrees.
    CentroidRa,
    /// Declination of the footprint centroid, degrees.
    CentroidDec,
}

/// One queryable field declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDecl {
    /// Field name as it appears in feature properties and filter specs.
    pub name: String,

    /// Declared type.
    #[serde(rename = "type")]
    pub field_type: FieldType,

    /// Human-readable label for the presentation layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Formatting expression, served verbatim to the presentation layer.
    /// The engine never evaluates it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_func: Option<String>,

    /// If set, this field is computed from geometry at build time instead
    /// of being read from feature properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived: Option<DerivedSource>,
}

/// The full field schema plus presentation extras.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Declared fields, in declaration order.
    pub fields: Vec<FieldDecl>,

    /// Free-form presentation extras (watermark image, color hints, ...),
    /// carried verbatim from `config.json` to the surrounding layer.
    #[serde(flatten)]
    pub extras: serde_json::Map<String, serde_json::Value>,
}

impl FieldSchema {
    /// Load the schema from a `config.json` file.
    pub fn load(path: &Path) -> Result<FieldSchema> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            DatabaseError::SchemaConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        let schema: FieldSchema = serde_json::from_str(&text).map_err(|e| {
            DatabaseError::SchemaConfig(format!("invalid {}: {e}", path.display()))
        })?;
        schema.validate()?;
        Ok(schema)
    }

    /// Validate the declarations: unique names, derived fields numeric.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for field in &self.fields {
            if field.name.is_empty() {
                return Err(DatabaseError::SchemaConfig("empty field name".into()));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(DatabaseError::SchemaConfig(format!(
                    "duplicate field: {}",
                    field.name
                )));
            }
            if field.derived.is_some() && field.field_type != FieldType::Number {
                return Err(DatabaseError::SchemaConfig(format!(
                    "derived field {} must be numeric",
                    field.name
                )));
            }
        }
        Ok(())
    }

    /// Look up a field declaration by name.
    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check whether a field is declared.
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Names of all declared fields.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}
