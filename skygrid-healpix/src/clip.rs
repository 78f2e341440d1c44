//! Cell geometry capability: bounding tests and polygon–cell clipping.
//!
//! Tile generation and covering computation only need three operations on
//! a (cell, footprint) pair: a cheap may-intersect prefilter, an exact
//! intersection test, and the exact clipped geometry. They are grouped
//! behind the [`CellGeometry`] trait so the pixelization scheme and the
//! clipping algorithm can be substituted and tested independently.
//!
//! [`PlanarClipper`] is the default implementation: cell boundaries are
//! sampled into lon/lat polygons (sampling matters for polar cells, whose
//! edges curve in the lon/lat plane) and clipping runs in the lon/lat plane
//! with boolean ops. Longitude periodicity is handled by rigidly shifting
//! each footprint polygon into the cell's frame; footprints are expected in
//! ring-continuous form (see the core normalization).

use crate::cell::SkyCell;
use crate::proj::boundary;
use geo::{BooleanOps, BoundingRect, Intersects};
use geo_types::{Coord, LineString, MultiPolygon, Polygon, Rect};

/// Geometry operations between footprints and sky cells.
pub trait CellGeometry: Send + Sync {
    /// Cheap prefilter: `false` guarantees the footprint does not intersect
    /// the cell; `true` means it may.
    fn may_intersect(&self, cell: SkyCell, footprint: &MultiPolygon<f64>) -> bool;

    /// Exact intersection test.
    fn intersects(&self, cell: SkyCell, footprint: &MultiPolygon<f64>) -> bool;

    /// Exact intersection geometry, or `None` when it is empty.
    fn clip(&self, cell: SkyCell, footprint: &MultiPolygon<f64>) -> Option<MultiPolygon<f64>>;
}

/// Build a cell's boundary as a closed lon/lat polygon.
///
/// Consecutive vertices are kept within 180 degrees of longitude of each
/// other, so cells straddling the wrap seam come out continuous (possibly
/// extending beyond [-180, 180)).
pub fn cell_polygon(cell: SkyCell, steps_per_edge: usize) -> Polygon<f64> {
    let ring = boundary(cell, steps_per_edge);
    let mut pts: Vec<Coord<f64>> = Vec::with_capacity(ring.len() + 1);
    let mut prev_lon = 0.0;
    for (i, &(lon, lat)) in ring.iter().enumerate() {
        let x = if i == 0 {
            lon
        } else {
            let mut x = lon;
            while x - prev_lon > 180.0 {
                x -= 360.0;
            }
            while x - prev_lon < -180.0 {
                x += 360.0;
            }
            x
        };
        prev_lon = x;
        pts.push(Coord { x, y: lat });
    }
    if let Some(&first) = pts.first() {
        pts.push(first);
    }
    Polygon::new(LineString::from(pts), vec![])
}

/// Planar clipping against sampled cell boundaries.
#[derive(Debug, Clone)]
pub struct PlanarClipper {
    /// Boundary samples per cell edge.
    steps_per_edge: usize,
}

impl PlanarClipper {
    /// Default boundary sampling.
    pub const DEFAULT_STEPS_PER_EDGE: usize = 8;

    /// Create a clipper with the default edge sampling.
    pub fn new() -> Self {
        Self {
            steps_per_edge: Self::DEFAULT_STEPS_PER_EDGE,
        }
    }

    /// Create a clipper with explicit edge sampling.
    pub fn with_steps_per_edge(steps_per_edge: usize) -> Self {
        Self {
            steps_per_edge: steps_per_edge.max(1),
        }
    }

    /// Shift a polygon rigidly by multiples of 360 degrees so its first
    /// vertex lands within 180 degrees of `center_lon`. Rigid shifts keep
    /// ring shape intact, unlike per-vertex wrapping.
    fn recentre(poly: &Polygon<f64>, center_lon: f64) -> Polygon<f64> {
        let first = match poly.exterior().0.first() {
            Some(c) => c.x,
            None => return poly.clone(),
        };
        let shift = ((center_lon - first) / 360.0).round() * 360.0;
        if shift == 0.0 {
            return poly.clone();
        }
        let shift_ring = |ring: &LineString<f64>| {
            LineString::from(
                ring.0
                    .iter()
                    .map(|c| Coord {
                        x: c.x + shift,
                        y: c.y,
                    })
                    .collect::<Vec<_>>(),
            )
        };
        Polygon::new(
            shift_ring(poly.exterior()),
            poly.interiors().iter().map(shift_ring).collect(),
        )
    }

    /// Cell polygon plus its bounding rect and mean longitude.
    fn cell_frame(&self, cell: SkyCell) -> (Polygon<f64>, Rect<f64>, f64) {
        let poly = cell_polygon(cell, self.steps_per_edge);
        // A closed non-empty ring always has a bounding rect.
        let rect = poly
            .bounding_rect()
            .unwrap_or_else(|| Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 0.0, y: 0.0 }));
        let center_lon = (rect.min().x + rect.max().x) / 2.0;
        (poly, rect, center_lon)
    }

    /// Bounding-rect test that tolerates the polar corner: a cell touching
    /// a pole covers all longitudes at that latitude extreme, which its
    /// sampled boundary rect underestimates.
    fn rects_may_intersect(cell_rect: &Rect<f64>, fp_rect: &Rect<f64>) -> bool {
        let lat_overlap =
            cell_rect.min().y <= fp_rect.max().y && cell_rect.max().y >= fp_rect.min().y;
        if !lat_overlap {
            return false;
        }
        let touches_pole = cell_rect.max().y >= 90.0 - 1e-9 || cell_rect.min().y <= -90.0 + 1e-9;
        if touches_pole {
            return true;
        }
        cell_rect.min().x <= fp_rect.max().x && cell_rect.max().x >= fp_rect.min().x
    }
}

impl Default for PlanarClipper {
    fn default() -> Self {
        Self::new()
    }
}

impl CellGeometry for PlanarClipper {
    fn may_intersect(&self, cell: SkyCell, footprint: &MultiPolygon<f64>) -> bool {
        let (_, cell_rect, center_lon) = self.cell_frame(cell);
        footprint.0.iter().any(|poly| {
            let shifted = Self::recentre(poly, center_lon);
            shifted
                .bounding_rect()
                .is_some_and(|r| Self::rects_may_intersect(&cell_rect, &r))
        })
    }

    fn intersects(&self, cell: SkyCell, footprint: &MultiPolygon<f64>) -> bool {
        let (cell_poly, cell_rect, center_lon) = self.cell_frame(cell);
        footprint.0.iter().any(|poly| {
            let shifted = Self::recentre(poly, center_lon);
            let rect_ok = shifted
                .bounding_rect()
                .is_some_and(|r| Self::rects_may_intersect(&cell_rect, &r));
            rect_ok && cell_poly.intersects(&shifted)
        })
    }

    fn clip(&self, cell: SkyCell, footprint: &MultiPolygon<f64>) -> Option<MultiPolygon<f64>> {
        let (cell_poly, cell_rect, center_lon) = self.cell_frame(cell);
        let cell_mp = MultiPolygon(vec![cell_poly]);

        let mut clipped: Vec<Polygon<f64>> = Vec::new();
        for poly in &footprint.0 {
            let shifted = Self::recentre(poly, center_lon);
            let rect_ok = shifted
                .bounding_rect()
                .is_some_and(|r| Self::rects_may_intersect(&cell_rect, &r));
            if !rect_ok {
                continue;
            }
            let piece = cell_mp.intersection(&MultiPolygon(vec![shifted]));
            clipped.extend(piece.0);
        }

        if clipped.is_empty() {
            None
        } else {
            Some(MultiPolygon(clipped))
        }
    }
}
