//! End-to-end scenarios: ingest, register, tiles, not-found semantics.
//!
//! The fixture has two non-overlapping footprints in different base cells:
//! survey A inside base cell 0 (around lon 45, lat 19.5) and survey B
//! inside base cell 1 (around lon 135, lat 41.5).

use skygrid_core::BuildIdentity;
use skygrid_engine::{build, BuildOptions, Engine, EngineConfig, Freshness};
use skygrid_healpix::PlanarClipper;
use std::path::Path;

const A_BASE_CELL: u64 = 0;
const B_BASE_CELL: u64 = 1;

fn quad_feature(
    lon0: f64,
    lat0: f64,
    lon1: f64,
    lat1: f64,
    props: serde_json::Value,
) -> serde_json::Value {
    serde_json::json!({
        "type": "Feature",
        "properties": props,
        "geometry": {
            "type": "Polygon",
            "coordinates": [[
                [lon0, lat0], [lon1, lat0], [lon1, lat1], [lon0, lat1], [lon0, lat0]
            ]]
        }
    })
}

fn write_dataset(dir: &Path) {
    std::fs::write(
        dir.join("config.json"),
        serde_json::json!({
            "fields": [
                {"name": "survey", "type": "string"},
                {"name": "mag", "type": "number"}
            ]
        })
        .to_string(),
    )
    .unwrap();
    std::fs::write(
        dir.join("footprints.geojson"),
        serde_json::json!({
            "type": "FeatureCollection",
            "features": [
                quad_feature(43.0, 17.5, 47.0, 21.5,
                    serde_json::json!({"survey": "A", "mag": 24.0})),
                quad_feature(133.0, 40.0, 137.0, 43.0,
                    serde_json::json!({"survey": "B", "mag": 26.0})),
            ]
        })
        .to_string(),
    )
    .unwrap();
}

fn build_engine(dir: &Path) -> Engine {
    write_dataset(dir);
    let db_path = dir.join("survey.db");
    build(
        dir,
        &db_path,
        &BuildIdentity::new("data-rev-1", "code-rev-1"),
        &serde_json::json!({"version": "test"}),
        &BuildOptions::default(),
        &PlanarClipper::new(),
    )
    .unwrap();
    Engine::open(&db_path, EngineConfig::default()).unwrap()
}

fn a_only_spec() -> serde_json::Value {
    serde_json::json!({"constraints": [
        {"field": "survey", "op": "eq", "value": "A"}
    ]})
}

fn tile_features(payload: &skygrid_engine::TilePayload) -> Vec<serde_json::Value> {
    let collection: serde_json::Value = serde_json::from_slice(&payload.bytes).unwrap();
    assert_eq!(collection["type"], "FeatureCollection");
    collection["features"].as_array().unwrap().clone()
}

#[tokio::test]
async fn test_allsky_contains_only_matching_coverage() {
    let dir = tempfile::tempdir().unwrap();
    let engine = build_engine(dir.path());
    let hash = engine.register_query(&a_only_spec()).unwrap();

    let payload = engine.fetch_tile(&hash, -1, 0).await.unwrap().unwrap();
    let features = tile_features(&payload);
    assert!(!features.is_empty());
    for feature in &features {
        assert_eq!(feature["properties"]["survey"], "A");
    }
}

#[tokio::test]
async fn test_foreign_base_cell_is_valid_and_empty() {
    let dir = tempfile::tempdir().unwrap();
    let engine = build_engine(dir.path());
    let hash = engine.register_query(&a_only_spec()).unwrap();

    // B's base cell under A's query: a valid tile with no features,
    // explicitly not "not found".
    let payload = engine
        .fetch_tile(&hash, 0, B_BASE_CELL)
        .await
        .unwrap()
        .expect("in-range tile must exist");
    assert_eq!(payload.feature_count, 0);
    assert!(tile_features(&payload).is_empty());
}

#[tokio::test]
async fn test_out_of_range_addresses_are_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let engine = build_engine(dir.path());
    let hash = engine.register_query(&a_only_spec()).unwrap();

    // Pixel 12 does not exist at order 0.
    assert!(engine.fetch_tile(&hash, 0, 12).await.unwrap().is_none());
    // Orders beyond the served maximum.
    assert!(engine.fetch_tile(&hash, 12, 0).await.unwrap().is_none());
    // Negative orders other than the all-sky address.
    assert!(engine.fetch_tile(&hash, -2, 0).await.unwrap().is_none());
    assert!(engine.fetch_tile(&hash, -1, 1).await.unwrap().is_none());
}

#[tokio::test]
async fn test_unknown_hash_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let engine = build_engine(dir.path());

    assert!(engine.resolve_query("0000000000000000").is_none());
    assert!(engine
        .fetch_tile("0000000000000000", 0, 0)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_tiles_are_byte_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let engine = build_engine(dir.path());
    let hash = engine.register_query(&a_only_spec()).unwrap();

    let first = engine
        .fetch_tile(&hash, 0, A_BASE_CELL)
        .await
        .unwrap()
        .unwrap();
    let second = engine
        .fetch_tile(&hash, 0, A_BASE_CELL)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.bytes, second.bytes);

    let allsky1 = engine.fetch_tile(&hash, -1, 0).await.unwrap().unwrap();
    let allsky2 = engine.fetch_tile(&hash, -1, 0).await.unwrap().unwrap();
    assert_eq!(allsky1.bytes, allsky2.bytes);
}

#[tokio::test]
async fn test_refinement_never_loses_parent_coverage() {
    let dir = tempfile::tempdir().unwrap();
    let engine = build_engine(dir.path());
    let hash = engine.register_query(&a_only_spec()).unwrap();

    // A sits inside order-1 pixel 0 (child of its base cell).
    let child = engine.fetch_tile(&hash, 1, 0).await.unwrap().unwrap();
    assert_eq!(child.feature_count, 1);

    let parent = engine
        .fetch_tile(&hash, 0, A_BASE_CELL)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(parent.feature_count, 1);

    let child_ids: Vec<u64> = tile_features(&child)
        .iter()
        .map(|f| f["id"].as_u64().unwrap())
        .collect();
    let parent_ids: Vec<u64> = tile_features(&parent)
        .iter()
        .map(|f| f["id"].as_u64().unwrap())
        .collect();
    for id in child_ids {
        assert!(parent_ids.contains(&id));
    }
}

#[tokio::test]
async fn test_query_statistics_and_rejections() {
    let dir = tempfile::tempdir().unwrap();
    let engine = build_engine(dir.path());

    let output = engine
        .query(&serde_json::json!({
            "constraints": [{"field": "survey", "op": "eq", "value": "A"}],
            "aggregations": [{"op": "count"}, {"op": "max", "field": "mag"}]
        }))
        .await
        .unwrap();
    assert_eq!(output.matched, 1);
    assert_eq!(output.aggregates[0].value, serde_json::json!(1));
    assert_eq!(output.aggregates[1].value, serde_json::json!(24.0));

    // Unknown field: a client error, not a crash.
    let err = engine
        .query(&serde_json::json!({
            "constraints": [{"field": "nonexistent", "op": "eq", "value": 1.0}]
        }))
        .await
        .unwrap_err();
    assert!(matches!(err, skygrid_engine::EngineError::Query(_)));
}

#[tokio::test]
async fn test_register_rejects_invalid_specs() {
    let dir = tempfile::tempdir().unwrap();
    let engine = build_engine(dir.path());

    assert!(engine
        .register_query(&serde_json::json!({
            "constraints": [{"field": "nonexistent", "op": "eq", "value": 1.0}]
        }))
        .is_err());
    assert!(engine
        .register_query(&serde_json::json!({
            "constraints": [{"field": "survey", "op": "similar-to", "value": "A"}]
        }))
        .is_err());
}

#[tokio::test]
async fn test_equivalent_specs_share_a_hash_distinct_specs_do_not() {
    let dir = tempfile::tempdir().unwrap();
    let engine = build_engine(dir.path());

    let h1 = engine
        .register_query(&serde_json::json!({"constraints": [
            {"field": "survey", "op": "eq", "value": "A"},
            {"field": "mag", "op": "lt", "value": 30.0}
        ]}))
        .unwrap();
    let h2 = engine
        .register_query(&serde_json::json!({"constraints": [
            {"field": "mag", "op": "lt", "value": 30.0},
            {"field": "survey", "op": "eq", "value": "A"}
        ]}))
        .unwrap();
    assert_eq!(h1, h2);

    let h3 = engine
        .register_query(&serde_json::json!({"constraints": [
            {"field": "survey", "op": "eq", "value": "B"}
        ]}))
        .unwrap();
    assert_ne!(h1, h3);

    // Both hashes resolve to their own specs.
    assert!(engine.resolve_query(&h1).is_some());
    assert!(engine.resolve_query(&h3).is_some());
}

#[tokio::test]
async fn test_rebuild_is_idempotent_and_freshness_converges() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path());
    let db_path = dir.path().join("survey.db");
    let identity = BuildIdentity::new("data-rev-1", "code-rev-1");

    let (state, report) = Engine::ensure_database(
        dir.path().to_path_buf(),
        db_path.clone(),
        identity.clone(),
        serde_json::json!({"version": "test"}),
        BuildOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(state, Freshness::NoDatabase);
    let first_hash = report.unwrap().content_hash;
    let first_bytes = std::fs::read(&db_path).unwrap();

    // Same identity again: fresh, no rebuild.
    let (state, report) = Engine::ensure_database(
        dir.path().to_path_buf(),
        db_path.clone(),
        identity.clone(),
        serde_json::json!({"version": "test"}),
        BuildOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(state, Freshness::Fresh);
    assert!(report.is_none());
    assert_eq!(std::fs::read(&db_path).unwrap(), first_bytes);

    // New data revision: stale, rebuilt, new hash.
    let (state, report) = Engine::ensure_database(
        dir.path().to_path_buf(),
        db_path.clone(),
        BuildIdentity::new("data-rev-2", "code-rev-1"),
        serde_json::json!({"version": "test"}),
        BuildOptions::default(),
    )
    .await
    .unwrap();
    assert!(matches!(state, Freshness::Stale { .. }));
    assert_ne!(report.unwrap().content_hash, first_hash);
}

#[tokio::test]
async fn test_extra_info_schema_and_manifest_are_served() {
    let dir = tempfile::tempdir().unwrap();
    let engine = build_engine(dir.path());

    let info = engine.extra_info();
    assert_eq!(info["server_info"]["version"], "test");
    assert_eq!(info["stats"]["features_added"], 2);

    assert!(engine.schema().has_field("survey"));

    let manifest = engine.manifest();
    assert!(manifest.contains("hips_tile_format = geojson"));
    assert!(manifest.contains(engine.database().content_hash()));
}
