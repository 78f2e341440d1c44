//! Hierarchical equal-area sky pixelization for skygrid.
//!
//! Implements the nested equal-area scheme used for tile addressing: 12
//! base cells at order 0, each subdividing into 4 children per order
//! (`12 * 4^k` cells at order k), nested-indexed so quad-tree navigation is
//! bit arithmetic.
//!
//! # Modules
//!
//! - [`cell`]: cell addressing and nesting arithmetic
//! - [`proj`]: projection math (position → pixel, centers, boundaries)
//! - [`clip`]: the [`clip::CellGeometry`] capability and the planar clipper
//! - [`covering`]: footprint coverings by recursive descent
//! - [`error`]: error types
//!
//! Everything here is pure computation; the engine layer decides where it
//! runs.

pub mod cell;
pub mod clip;
pub mod covering;
pub mod error;
pub mod proj;

pub use cell::{n_cells, SkyCell, MAX_ORDER, N_BASE_CELLS};
pub use clip::{cell_polygon, CellGeometry, PlanarClipper};
pub use covering::covering;
pub use error::{HealpixError, Result};
