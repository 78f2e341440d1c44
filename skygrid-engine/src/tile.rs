//! Hierarchical tile generation.
//!
//! A tile is the clipped geometry of one query's matching features inside
//! one sky cell, serialized as a GeoJSON FeatureCollection. Candidates come
//! from the precomputed coverage index, never from a geometric test over
//! the whole feature set:
//!
//! - requested order at or above the coverage order → range scan over the
//!   cell's descendants at the coverage order
//! - requested order below the coverage order → exact lookup of the cell's
//!   ancestor
//!
//! The all-sky address `(-1, 0)` skips exact clipping entirely and renders
//! each matching feature as the outline of its coverage cells at a coarse
//! order. It is requested unconditionally on every client load, so it must
//! stay cheap no matter how complex the footprints are.
//!
//! Tile generation is a pure function of (database, query, cell): no shared
//! state, no interior mutability, byte-deterministic output.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use serde_json::json;
use skygrid_core::{feature::footprint_to_geojson, Database, Feature};
use skygrid_healpix::{cell_polygon, CellGeometry, SkyCell, MAX_ORDER};
use skygrid_query::Query;

/// The reserved all-sky tile address: order -1, pixel 0.
pub const ALLSKY_ORDER: i32 = -1;

/// A serialized tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilePayload {
    /// GeoJSON FeatureCollection bytes.
    pub bytes: Vec<u8>,

    /// Number of features in the collection.
    pub feature_count: usize,
}

/// Counters from one tile computation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TileStats {
    /// Candidates from the coverage index.
    pub candidates: usize,

    /// Candidates surviving the attribute filter.
    pub matched: usize,

    /// Features with a non-empty clip against the cell.
    pub clipped: usize,
}

/// Generate the tile for `(query, order, pix)`.
///
/// Returns `Ok(None)` for an out-of-range address — explicitly distinct
/// from a valid tile with no features, which is `Ok(Some(...))` with an
/// empty collection.
pub fn generate(
    db: &Database,
    query: &Query,
    order: i32,
    pix: u64,
    config: &EngineConfig,
    geom: &dyn CellGeometry,
) -> Result<Option<TilePayload>> {
    if order == ALLSKY_ORDER && pix == 0 {
        return Ok(Some(generate_allsky(db, query, config)));
    }
    if order < 0 || order > config.max_tile_order.min(MAX_ORDER) as i32 {
        return Ok(None);
    }
    let Ok(cell) = SkyCell::new(order, pix) else {
        return Ok(None);
    };
    generate_cell(db, query, cell, geom).map(Some)
}

/// Candidate feature ids for a cell, from the coverage index.
fn candidates(db: &Database, cell: SkyCell) -> Vec<u32> {
    let coverage_order = db.coverage_order();
    if cell.order() <= coverage_order {
        match cell.descendants_range(coverage_order) {
            Some((lo, hi)) => db.index().features_in_range(lo, hi),
            None => Vec::new(),
        }
    } else {
        match cell.ancestor_at(coverage_order) {
            Some(ancestor) => db.index().features_in_cell(ancestor.pix()),
            None => Vec::new(),
        }
    }
}

fn generate_cell(
    db: &Database,
    query: &Query,
    cell: SkyCell,
    geom: &dyn CellGeometry,
) -> Result<TilePayload> {
    let mut stats = TileStats::default();
    let mut features: Vec<serde_json::Value> = Vec::new();

    for id in candidates(db, cell) {
        stats.candidates += 1;
        let Some(feature) = db.feature(id) else {
            return Err(EngineError::Internal(format!(
                "coverage index references missing feature {id}"
            )));
        };
        if !query.filter.matches(&feature.properties) {
            continue;
        }
        stats.matched += 1;
        if let Some(clipped) = geom.clip(cell, &feature.footprint) {
            stats.clipped += 1;
            features.push(geojson_feature(feature, footprint_to_geojson(&clipped)));
        }
    }

    tracing::debug!(
        cell = %cell,
        candidates = stats.candidates,
        matched = stats.matched,
        clipped = stats.clipped,
        "Generated tile"
    );
    Ok(serialize_collection(features))
}

/// The all-sky overview: coarsened outlines instead of exact clipping.
fn generate_allsky(db: &Database, query: &Query, config: &EngineConfig) -> TilePayload {
    let allsky_order = config.allsky_order.min(db.coverage_order());
    let shift = 2 * (db.coverage_order() - allsky_order) as u64;

    let mut features: Vec<serde_json::Value> = Vec::new();
    for feature in db.features() {
        if !query.filter.matches(&feature.properties) {
            continue;
        }
        let mut coarse: Vec<u64> = feature.coverage.iter().map(|c| c >> shift).collect();
        coarse.dedup();

        let polygons: Vec<serde_json::Value> = coarse
            .iter()
            .filter_map(|&pix| SkyCell::new(allsky_order as i32, pix).ok())
            .map(|cell| {
                let poly = wrap_cell_polygon(cell, config.boundary_steps);
                footprint_to_geojson(&geo_types::MultiPolygon(vec![poly]))
            })
            .collect();

        // One GeoJSON feature per coverage cell keeps the overview geometry
        // trivial to render; attributes repeat on each piece.
        for geometry in polygons {
            features.push(geojson_feature(feature, geometry));
        }
    }
    serialize_collection(features)
}

/// Cell outline shifted rigidly so its first vertex lies in [-180, 180).
fn wrap_cell_polygon(cell: SkyCell, steps: usize) -> geo_types::Polygon<f64> {
    use geo_types::{Coord, LineString};
    let poly = cell_polygon(cell, steps);
    let first = poly.exterior().0.first().map(|c| c.x).unwrap_or(0.0);
    let mut shift = 0.0;
    let mut x = first;
    while x >= 180.0 {
        x -= 360.0;
        shift -= 360.0;
    }
    while x < -180.0 {
        x += 360.0;
        shift += 360.0;
    }
    if shift == 0.0 {
        return poly;
    }
    let ring = LineString::from(
        poly.exterior()
            .0
            .iter()
            .map(|c| Coord {
                x: c.x + shift,
                y: c.y,
            })
            .collect::<Vec<_>>(),
    );
    geo_types::Polygon::new(ring, vec![])
}

fn geojson_feature(feature: &Feature, geometry: serde_json::Value) -> serde_json::Value {
    let properties: serde_json::Map<String, serde_json::Value> = feature
        .properties
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect();
    json!({
        "type": "Feature",
        "id": feature.id,
        "properties": properties,
        "geometry": geometry,
    })
}

fn serialize_collection(features: Vec<serde_json::Value>) -> TilePayload {
    let feature_count = features.len();
    let collection = json!({
        "type": "FeatureCollection",
        "features": features,
    });
    TilePayload {
        bytes: collection.to_string().into_bytes(),
        feature_count,
    }
}
