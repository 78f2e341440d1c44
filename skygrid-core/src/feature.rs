//! Survey footprint features and their GeoJSON encoding.
//!
//! A feature is one observation footprint: a polygon (or multi-polygon) on
//! the celestial sphere in (ra, dec) degrees, a flat attribute map, a stable
//! id, and the precomputed set of sky cells its footprint intersects.
//! Features are immutable after ingestion.
//!
//! Geometry travels as GeoJSON at the boundary (input collections and tile
//! payloads); internally it is `geo_types::MultiPolygon<f64>` with x = ra
//! and y = dec.

use crate::error::{DatabaseError, Result};
use crate::value::Value;
use geo_types::{Coord, LineString, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One footprint feature.
///
/// `properties` is a `BTreeMap` so every serialization of a feature is
/// byte-deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    /// Stable id, assigned at ingestion.
    pub id: u64,

    /// Attribute fields (declared fields only, plus derived fields).
    pub properties: BTreeMap<String, Value>,

    /// Footprint geometry in (ra, dec) degrees.
    pub footprint: MultiPolygon<f64>,

    /// Nested cell indices at the database's coverage order that this
    /// footprint intersects. Sorted ascending.
    pub coverage: Vec<u64>,
}

impl Feature {
    /// Get a property value by field name.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

/// Wrap a longitude into [-180, 180).
pub fn wrap_lon(lon: f64) -> f64 {
    let mut l = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if l >= 180.0 {
        l -= 360.0;
    }
    l
}

/// Shoelace area of a ring (planar, in square degrees).
fn ring_area(ring: &LineString<f64>) -> f64 {
    let pts = &ring.0;
    if pts.len() < 4 {
        return 0.0;
    }
    let mut sum = 0.0;
    for w in pts.windows(2) {
        sum += w[0].x * w[1].y - w[1].x * w[0].y;
    }
    (sum / 2.0).abs()
}

/// Wrap a ring's longitudes while keeping it continuous.
///
/// The first vertex is wrapped into [-180, 180); every later vertex is
/// shifted by a multiple of 360 to stay within 180 of its predecessor, so a
/// ring crossing the antimeridian is not torn apart. Vertices of such a
/// ring may land slightly outside [-180, 180); consumers treat longitude as
/// periodic.
fn unwrap_ring(ring: &LineString<f64>) -> LineString<f64> {
    let mut pts: Vec<Coord<f64>> = Vec::with_capacity(ring.0.len());
    let mut prev_x = 0.0;
    for (i, c) in ring.0.iter().enumerate() {
        let x = if i == 0 {
            wrap_lon(c.x)
        } else {
            let mut x = c.x;
            while x - prev_x > 180.0 {
                x -= 360.0;
            }
            while x - prev_x < -180.0 {
                x += 360.0;
            }
            x
        };
        prev_x = x;
        pts.push(Coord { x, y: c.y });
    }
    LineString::from(pts)
}

/// Normalize a footprint: wrap longitudes (ring-continuously), drop
/// degenerate rings.
///
/// A ring is degenerate when it has fewer than 4 positions (GeoJSON rings
/// are closed, so 4 is a triangle) or zero area. Returns `None` when no
/// valid polygon remains.
pub fn normalize_footprint(mp: MultiPolygon<f64>) -> Option<MultiPolygon<f64>> {
    let mut polygons = Vec::new();
    for poly in mp {
        let exterior = unwrap_ring(poly.exterior());
        if exterior.0.len() < 4 || ring_area(&exterior) == 0.0 {
            continue;
        }
        let interiors: Vec<LineString<f64>> = poly
            .interiors()
            .iter()
            .map(unwrap_ring)
            .filter(|ring| ring.0.len() >= 4 && ring_area(ring) > 0.0)
            .collect();
        polygons.push(Polygon::new(exterior, interiors));
    }
    if polygons.is_empty() {
        None
    } else {
        Some(MultiPolygon(polygons))
    }
}

/// Parse a GeoJSON geometry object into a footprint.
///
/// Accepts `Polygon` and `MultiPolygon`; everything else is an error
/// (footprints are areas, not points or lines).
pub fn footprint_from_geojson(geom: &serde_json::Value) -> Result<MultiPolygon<f64>> {
    let geom_type = geom
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| DatabaseError::Geometry("geometry without type".into()))?;
    let coords = geom
        .get("coordinates")
        .ok_or_else(|| DatabaseError::Geometry("geometry without coordinates".into()))?;

    match geom_type {
        "Polygon" => Ok(MultiPolygon(vec![parse_polygon(coords)?])),
        "MultiPolygon" => {
            let arr = coords
                .as_array()
                .ok_or_else(|| DatabaseError::Geometry("MultiPolygon coordinates".into()))?;
            let polygons = arr.iter().map(parse_polygon).collect::<Result<Vec<_>>>()?;
            Ok(MultiPolygon(polygons))
        }
        other => Err(DatabaseError::Geometry(format!(
            "unsupported geometry type: {other}"
        ))),
    }
}

fn parse_polygon(coords: &serde_json::Value) -> Result<Polygon<f64>> {
    let rings = coords
        .as_array()
        .ok_or_else(|| DatabaseError::Geometry("Polygon coordinates".into()))?;
    if rings.is_empty() {
        return Err(DatabaseError::Geometry("polygon without rings".into()));
    }
    let mut parsed: Vec<LineString<f64>> = Vec::with_capacity(rings.len());
    for ring in rings {
        let positions = ring
            .as_array()
            .ok_or_else(|| DatabaseError::Geometry("ring is not an array".into()))?;
        let mut pts = Vec::with_capacity(positions.len());
        for pos in positions {
            let pair = pos
                .as_array()
                .filter(|p| p.len() >= 2)
                .ok_or_else(|| DatabaseError::Geometry("position is not [lon, lat]".into()))?;
            let x = pair[0]
                .as_f64()
                .ok_or_else(|| DatabaseError::Geometry("non-numeric longitude".into()))?;
            let y = pair[1]
                .as_f64()
                .ok_or_else(|| DatabaseError::Geometry("non-numeric latitude".into()))?;
            if !(-90.0..=90.0).contains(&y) {
                return Err(DatabaseError::Geometry(format!("latitude out of range: {y}")));
            }
            pts.push(Coord { x, y });
        }
        parsed.push(LineString::from(pts));
    }
    let exterior = parsed.remove(0);
    Ok(Polygon::new(exterior, parsed))
}

/// Serialize a footprint as a GeoJSON geometry object.
///
/// A single polygon is emitted as `Polygon`, multiple as `MultiPolygon`.
pub fn footprint_to_geojson(mp: &MultiPolygon<f64>) -> serde_json::Value {
    let mut polys: Vec<serde_json::Value> = mp.0.iter().map(polygon_coords).collect();
    if polys.len() == 1 {
        serde_json::json!({"type": "Polygon", "coordinates": polys.pop()})
    } else {
        serde_json::json!({"type": "MultiPolygon", "coordinates": polys})
    }
}

fn polygon_coords(poly: &Polygon<f64>) -> serde_json::Value {
    let ring_coords = |ring: &LineString<f64>| -> serde_json::Value {
        serde_json::Value::Array(
            ring.0
                .iter()
                .map(|c| serde_json::json!([c.x, c.y]))
                .collect(),
        )
    };
    let mut rings = vec![ring_coords(poly.exterior())];
    rings.extend(poly.interiors().iter().map(ring_coords));
    serde_json::Value::Array(rings)
}
