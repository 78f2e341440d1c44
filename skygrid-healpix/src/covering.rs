//! Footprint coverings.
//!
//! A covering is the set of cells at a target order whose area intersects
//! a footprint. Computed by recursive descent from the 12 base cells: the
//! cheap may-intersect prefilter prunes whole subtrees, the exact test runs
//! only at the target order.

use crate::cell::{SkyCell, N_BASE_CELLS};
use crate::clip::CellGeometry;
use crate::error::Result;
use geo_types::MultiPolygon;

/// Compute the covering of `footprint` at `order`.
///
/// Returns nested pixel indices at `order`, sorted ascending.
pub fn covering(
    footprint: &MultiPolygon<f64>,
    order: u8,
    geom: &dyn CellGeometry,
) -> Result<Vec<u64>> {
    let mut cells = Vec::new();
    for base in 0..N_BASE_CELLS {
        let cell = SkyCell::base(base)?;
        descend(cell, footprint, order, geom, &mut cells)?;
    }
    cells.sort_unstable();
    Ok(cells)
}

fn descend(
    cell: SkyCell,
    footprint: &MultiPolygon<f64>,
    target: u8,
    geom: &dyn CellGeometry,
    out: &mut Vec<u64>,
) -> Result<()> {
    if !geom.may_intersect(cell, footprint) {
        return Ok(());
    }
    if cell.order() >= target {
        if geom.intersects(cell, footprint) {
            out.push(cell.pix());
        }
        return Ok(());
    }
    for child in cell.children()? {
        descend(child, footprint, target, geom, out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::PlanarClipper;
    use crate::proj::ang2pix;
    use geo_types::{LineString, Polygon};

    fn quad(lon0: f64, lat0: f64, lon1: f64, lat1: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![Polygon::new(
            LineString::from(vec![
                (lon0, lat0),
                (lon1, lat0),
                (lon1, lat1),
                (lon0, lat1),
                (lon0, lat0),
            ]),
            vec![],
        )])
    }

    #[test]
    fn test_small_footprint_covering_contains_its_center_cell() {
        let clipper = PlanarClipper::new();
        let fp = quad(9.0, 9.0, 11.0, 11.0);
        let cells = covering(&fp, 3, &clipper).unwrap();
        assert!(!cells.is_empty());
        assert!(cells.contains(&ang2pix(3, 10.0, 10.0)));
        // A 2-degree quad covers a handful of order-3 cells, not the sky.
        assert!(cells.len() < 16);
    }

    #[test]
    fn test_covering_is_sorted_and_unique() {
        let clipper = PlanarClipper::new();
        let fp = quad(-30.0, -10.0, 30.0, 10.0);
        let cells = covering(&fp, 2, &clipper).unwrap();
        let mut sorted = cells.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(cells, sorted);
    }

    #[test]
    fn test_disjoint_footprints_have_disjoint_coverings() {
        let clipper = PlanarClipper::new();
        // Centers of two different equatorial faces.
        let a = covering(&quad(-2.0, -2.0, 2.0, 2.0), 2, &clipper).unwrap();
        let b = covering(&quad(88.0, -2.0, 92.0, 2.0), 2, &clipper).unwrap();
        assert!(!a.is_empty() && !b.is_empty());
        assert!(a.iter().all(|c| !b.contains(c)));
    }

    #[test]
    fn test_covering_at_order_zero() {
        let clipper = PlanarClipper::new();
        let fp = quad(-1.0, -1.0, 1.0, 1.0);
        let cells = covering(&fp, 0, &clipper).unwrap();
        assert_eq!(cells, vec![4]);
    }
}
