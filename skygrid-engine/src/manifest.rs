//! Pixelization manifest.
//!
//! A small, query-independent properties document advertising the tiling
//! parameters to external viewers, in the conventional `key = value` text
//! form used by hierarchical sky survey clients.

use crate::config::EngineConfig;
use skygrid_core::Database;

/// Render the manifest for a database served with `config`.
pub fn render(db: &Database, config: &EngineConfig) -> String {
    let mut out = String::new();
    let mut push = |key: &str, value: &str| {
        out.push_str(key);
        out.push_str(" = ");
        out.push_str(value);
        out.push('\n');
    };

    push("dataproduct_type", "survey-footprints");
    push("hips_tile_format", "geojson");
    push("hips_frame", "equatorial");
    push("hips_pixelization", "healpix-nested");
    push("hips_order_min", "0");
    push("hips_order", &config.max_tile_order.to_string());
    push("skygrid_database", db.content_hash());
    push("skygrid_coverage_order", &db.coverage_order().to_string());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use skygrid_core::{CoverageIndex, DatabaseImage, FieldSchema};

    #[test]
    fn test_manifest_advertises_tiling_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("survey.db");
        let schema: FieldSchema =
            serde_json::from_value(serde_json::json!({"fields": []})).unwrap();
        DatabaseImage {
            content_hash: "cafe012345678901".into(),
            schema,
            extra_info: serde_json::Value::Null,
            coverage_order: 3,
            features: Vec::new(),
            index: CoverageIndex::default(),
        }
        .write(&path)
        .unwrap();
        let db = Database::open(&path).unwrap();

        let text = render(&db, &EngineConfig::default());
        assert!(text.contains("hips_tile_format = geojson"));
        assert!(text.contains("hips_order = 11"));
        assert!(text.contains("skygrid_database = cafe012345678901"));
        // Every line is a key = value pair.
        for line in text.lines() {
            assert!(line.contains(" = "), "line: {line}");
        }
    }
}
