//! Nested equal-area projection math.
//!
//! Implements the standard astronomical nested pixelization: the sphere is
//! split into 12 base diamonds (4 north-polar, 4 equatorial, 4 south-polar),
//! each carrying an `nside * nside` grid at order k (`nside = 2^k`). A cell
//! is addressed by `(face, ix, iy)`; the nested pixel index interleaves the
//! grid coordinates so quad-tree nesting is bit arithmetic.
//!
//! Longitude/latitude are in degrees, with longitude = right ascension and
//! latitude = declination. All functions are pure.

use crate::cell::SkyCell;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, TAU};

/// Ring offsets of the 12 base faces (z direction).
const JRLL: [f64; 12] = [2.0, 2.0, 2.0, 2.0, 3.0, 3.0, 3.0, 3.0, 4.0, 4.0, 4.0, 4.0];

/// Longitude offsets of the 12 base faces, in units of 45 degrees.
const JPLL: [f64; 12] = [1.0, 3.0, 5.0, 7.0, 0.0, 2.0, 4.0, 6.0, 1.0, 3.0, 5.0, 7.0];

/// Spread the lower 32 bits of `v` into the even bit positions.
fn spread_bits(v: u64) -> u64 {
    let mut x = v & 0xffff_ffff;
    x = (x | (x << 16)) & 0x0000_ffff_0000_ffff;
    x = (x | (x << 8)) & 0x00ff_00ff_00ff_00ff;
    x = (x | (x << 4)) & 0x0f0f_0f0f_0f0f_0f0f;
    x = (x | (x << 2)) & 0x3333_3333_3333_3333;
    x = (x | (x << 1)) & 0x5555_5555_5555_5555;
    x
}

/// Gather the even bit positions of `v` into the lower 32 bits.
fn compress_bits(v: u64) -> u64 {
    let mut x = v & 0x5555_5555_5555_5555;
    x = (x | (x >> 1)) & 0x3333_3333_3333_3333;
    x = (x | (x >> 2)) & 0x0f0f_0f0f_0f0f_0f0f;
    x = (x | (x >> 4)) & 0x00ff_00ff_00ff_00ff;
    x = (x | (x >> 8)) & 0x0000_ffff_0000_ffff;
    x = (x | (x >> 16)) & 0x0000_0000_ffff_ffff;
    x
}

/// Combine `(face, ix, iy)` into a nested pixel index.
pub fn xyf_to_nest(order: u8, face: u64, ix: u64, iy: u64) -> u64 {
    (face << (2 * order as u64)) | spread_bits(ix) | (spread_bits(iy) << 1)
}

/// Split a nested pixel index into `(face, ix, iy)`.
pub fn nest_to_xyf(order: u8, pix: u64) -> (u64, u64, u64) {
    let face = pix >> (2 * order as u64);
    let within = pix & ((1u64 << (2 * order as u64)) - 1);
    (face, compress_bits(within), compress_bits(within >> 1))
}

/// Map a sky position to the nested pixel index containing it.
pub fn ang2pix(order: u8, lon_deg: f64, lat_deg: f64) -> u64 {
    let nside = (1u64 << order) as f64;
    let z = lat_deg.to_radians().sin();
    let phi = lon_deg.to_radians().rem_euclid(TAU);
    let tt = (phi / FRAC_PI_2) % 4.0;

    let (face, ix, iy) = if z.abs() <= 2.0 / 3.0 {
        // Equatorial region.
        let temp1 = nside * (0.5 + tt);
        let temp2 = nside * (z * 0.75);
        let jp = (temp1 - temp2).floor() as u64;
        let jm = (temp1 + temp2).floor() as u64;
        let ifp = jp >> order;
        let ifm = jm >> order;
        let face = if ifp == ifm {
            (ifp & 3) + 4
        } else if ifp < ifm {
            ifp & 3
        } else {
            (ifm & 3) + 8
        };
        let mask = (1u64 << order) - 1;
        let ix = jm & mask;
        let iy = mask - (jp & mask);
        (face, ix, iy)
    } else {
        // Polar caps.
        let ntt = (tt.floor() as u64).min(3);
        let tp = tt - ntt as f64;
        let tmp = nside * (3.0 * (1.0 - z.abs())).sqrt();
        let max_i = (1u64 << order) - 1;
        let jp = ((tp * tmp).floor() as u64).min(max_i);
        let jm = (((1.0 - tp) * tmp).floor() as u64).min(max_i);
        if z >= 0.0 {
            (ntt, max_i - jm, max_i - jp)
        } else {
            (ntt + 8, jp, jm)
        }
    };

    xyf_to_nest(order, face, ix, iy)
}

/// Map face-local fractional coordinates to a sky position.
///
/// `(u, v)` are in `[0, 1]^2` over the face, aligned with the `(ix, iy)`
/// grid axes. This is the continuous inverse of the projection; integer
/// grid points plus 0.5 give cell centers, corners give cell vertices.
pub fn fxy_to_lonlat(face: u64, u: f64, v: f64) -> (f64, f64) {
    let jr = JRLL[face as usize] - (u + v);
    let (z, phi) = if jr < 1.0 {
        // North polar cap.
        let nr = jr;
        let z = 1.0 - nr * nr / 3.0;
        let phi = if nr < 1e-12 {
            FRAC_PI_4 * JPLL[face as usize]
        } else {
            FRAC_PI_4 * (JPLL[face as usize] + (u - v) / nr)
        };
        (z, phi)
    } else if jr > 3.0 {
        // South polar cap.
        let nr = 4.0 - jr;
        let z = nr * nr / 3.0 - 1.0;
        let phi = if nr < 1e-12 {
            FRAC_PI_4 * JPLL[face as usize]
        } else {
            FRAC_PI_4 * (JPLL[face as usize] + (u - v) / nr)
        };
        (z, phi)
    } else {
        // Equatorial region.
        let z = (2.0 - jr) * 2.0 / 3.0;
        let phi = FRAC_PI_4 * (JPLL[face as usize] + (u - v));
        (z, phi)
    };
    (phi.to_degrees(), z.clamp(-1.0, 1.0).asin().to_degrees())
}

/// The center of a cell, in (lon, lat) degrees.
pub fn center(cell: SkyCell) -> (f64, f64) {
    let nside = cell.nside() as f64;
    let (face, ix, iy) = nest_to_xyf(cell.order(), cell.pix());
    fxy_to_lonlat(
        face,
        (ix as f64 + 0.5) / nside,
        (iy as f64 + 0.5) / nside,
    )
}

/// The boundary of a cell as an open ring of (lon, lat) vertices.
///
/// Walks the four edges counterclockwise with `steps` samples per edge
/// (so `4 * steps` vertices). Sampling matters for polar cells, whose
/// edges are curves in the lon/lat plane.
pub fn boundary(cell: SkyCell, steps: usize) -> Vec<(f64, f64)> {
    let steps = steps.max(1);
    let nside = cell.nside() as f64;
    let (face, ix, iy) = nest_to_xyf(cell.order(), cell.pix());
    let (x0, y0) = (ix as f64 / nside, iy as f64 / nside);
    let cell_size = 1.0 / nside;

    let mut ring = Vec::with_capacity(4 * steps);
    for i in 0..steps {
        let t = i as f64 / steps as f64 * cell_size;
        ring.push((x0 + t, y0));
    }
    for i in 0..steps {
        let t = i as f64 / steps as f64 * cell_size;
        ring.push((x0 + cell_size, y0 + t));
    }
    for i in 0..steps {
        let t = i as f64 / steps as f64 * cell_size;
        ring.push((x0 + cell_size - t, y0 + cell_size));
    }
    for i in 0..steps {
        let t = i as f64 / steps as f64 * cell_size;
        ring.push((x0, y0 + cell_size - t));
    }

    ring.into_iter()
        .map(|(u, v)| fxy_to_lonlat(face, u, v))
        .collect()
}
