//! Engine configuration types.

use std::time::Duration;

/// Options for one database build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Order of the precomputed coverage cells. Higher orders give tighter
    /// candidate sets per tile at the cost of more index entries.
    pub coverage_order: u8,

    /// Rebuild even when the persisted database is fresh.
    pub force_rebuild: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            coverage_order: 3,
            force_rebuild: false,
        }
    }
}

impl BuildOptions {
    /// Set the coverage order.
    pub fn with_coverage_order(mut self, order: u8) -> Self {
        self.coverage_order = order;
        self
    }

    /// Force a rebuild regardless of freshness.
    pub fn with_force_rebuild(mut self, force: bool) -> Self {
        self.force_rebuild = force;
        self
    }
}

/// Serving configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Deepest order served; (order, pix) beyond this is not-found.
    pub max_tile_order: u8,

    /// Order of the coarsened cells used for the all-sky tile.
    pub allsky_order: u8,

    /// Boundary samples per cell edge for clipping.
    pub boundary_steps: usize,

    /// Wall-clock bound per query/tile computation.
    pub request_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_tile_order: 11,
            allsky_order: 1,
            boundary_steps: 8,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl EngineConfig {
    /// Set the deepest served order.
    pub fn with_max_tile_order(mut self, order: u8) -> Self {
        self.max_tile_order = order;
        self
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
