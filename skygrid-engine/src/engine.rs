//! The engine facade.
//!
//! One `Engine` per process: it owns the opened database (immutable,
//! shared), the injected query registry, the geometry capability and the
//! serving configuration. Request serving is expected to run on a
//! non-blocking dispatch loop, so every potentially CPU-heavy operation
//! (query evaluation, tile clipping, ingestion) is offloaded to
//! `spawn_blocking` workers behind a global semaphore — a bounded queue,
//! not unbounded spawning — and bounded in wall-clock time.
//!
//! A worker panic during one computation surfaces as an internal error for
//! that request only; the engine and its database stay healthy.

use crate::builder::{self, BuildReport};
use crate::config::{BuildOptions, EngineConfig};
use crate::error::{EngineError, Result};
use crate::freshness::{self, Freshness};
use crate::manifest;
use crate::registry::QueryRegistry;
use crate::tile::{self, TilePayload};
use skygrid_core::{BuildIdentity, Database, FieldSchema};
use skygrid_healpix::{CellGeometry, PlanarClipper};
use skygrid_query::{query_hash, Query, QueryOutput};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tokio::sync::Semaphore;

/// Default bound on concurrent CPU-heavy jobs.
///
/// Clipping over large candidate sets is CPU-bound; without a bound, a
/// burst of tile requests would spawn blocking threads past the point of
/// useful parallelism.
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 4;

static JOB_SEMAPHORE: OnceLock<Semaphore> = OnceLock::new();

/// Set the maximum number of concurrent CPU-heavy jobs.
///
/// Must be called before the first request. Returns `false` (and does
/// nothing) once the bound has been initialized.
pub fn set_max_concurrent_jobs(max: usize) -> bool {
    JOB_SEMAPHORE.set(Semaphore::new(max.max(1))).is_ok()
}

fn job_semaphore() -> &'static Semaphore {
    JOB_SEMAPHORE.get_or_init(|| {
        let max = std::thread::available_parallelism()
            .map(|p| p.get().saturating_sub(1).max(1))
            .unwrap_or(DEFAULT_MAX_CONCURRENT_JOBS)
            .min(DEFAULT_MAX_CONCURRENT_JOBS);
        Semaphore::new(max)
    })
}

/// The serving facade over one opened database.
pub struct Engine {
    db: Arc<Database>,
    registry: Arc<QueryRegistry>,
    geom: Arc<dyn CellGeometry>,
    config: EngineConfig,
}

impl Engine {
    /// Open the database at `path` with a fresh registry and the default
    /// planar clipper.
    pub fn open(path: &Path, config: EngineConfig) -> Result<Engine> {
        let clipper = PlanarClipper::with_steps_per_edge(config.boundary_steps);
        Ok(Engine::with_parts(
            Arc::new(Database::open(path)?),
            Arc::new(QueryRegistry::new()),
            Arc::new(clipper),
            config,
        ))
    }

    /// Assemble an engine from injected parts.
    pub fn with_parts(
        db: Arc<Database>,
        registry: Arc<QueryRegistry>,
        geom: Arc<dyn CellGeometry>,
        config: EngineConfig,
    ) -> Engine {
        Engine {
            db,
            registry,
            geom,
            config,
        }
    }

    /// Ensure a fresh database exists at `db_path`, rebuilding from
    /// `data_dir` when needed. Runs before serving begins; never call it
    /// with an engine already open on the same path.
    ///
    /// Returns the assessed freshness and, when a rebuild ran, its report.
    pub async fn ensure_database(
        data_dir: PathBuf,
        db_path: PathBuf,
        identity: BuildIdentity,
        server_info: serde_json::Value,
        options: BuildOptions,
    ) -> Result<(Freshness, Option<BuildReport>)> {
        let state = freshness::assess(&db_path, &identity);
        if !state.needs_rebuild() && !options.force_rebuild {
            tracing::info!(content_hash = %identity.content_hash(), "Reusing fresh database");
            return Ok((state, None));
        }

        let geom = PlanarClipper::new();
        let report = tokio::task::spawn_blocking(move || {
            builder::build(&data_dir, &db_path, &identity, &server_info, &options, &geom)
        })
        .await
        .map_err(|e| EngineError::Internal(format!("build worker: {e}")))??;
        Ok((state, Some(report)))
    }

    /// The opened database.
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Free-form build metadata, served verbatim.
    pub fn extra_info(&self) -> serde_json::Value {
        self.db.extra_info().clone()
    }

    /// Field schema and presentation rules, served verbatim.
    pub fn schema(&self) -> &FieldSchema {
        self.db.schema()
    }

    /// The pixelization manifest.
    pub fn manifest(&self) -> String {
        manifest::render(&self.db, &self.config)
    }

    /// Evaluate a filter/aggregation spec directly (no tile address).
    pub async fn query(&self, spec: &serde_json::Value) -> Result<QueryOutput> {
        let query = Arc::new(Query::parse(spec, self.db.schema())?);
        let db = self.db.clone();
        self.run_bounded("query", move || {
            skygrid_query::evaluate(db.features(), &query)
        })
        .await
    }

    /// Register a query spec; returns its hash, bound to this database.
    pub fn register_query(&self, spec: &serde_json::Value) -> Result<String> {
        let query = Query::parse(spec, self.db.schema())?;
        let hash = query_hash(&query, self.db.content_hash());
        self.registry.insert(&hash, spec.clone(), Arc::new(query));
        tracing::debug!(hash = %hash, "Registered query");
        Ok(hash)
    }

    /// Resolve a query hash to a defensive copy of its spec.
    ///
    /// `None` covers both never-registered hashes and hashes from before a
    /// restart; callers treat it as access-denied, not as a server fault.
    pub fn resolve_query(&self, hash: &str) -> Option<serde_json::Value> {
        self.registry.resolve(hash)
    }

    /// Fetch the tile for a registered query at `(order, pix)`.
    ///
    /// `(-1, 0)` is the all-sky overview. `Ok(None)` means not-found — an
    /// unresolvable hash or an out-of-range address — and is distinct from
    /// a valid tile with no features.
    pub async fn fetch_tile(
        &self,
        hash: &str,
        order: i32,
        pix: u64,
    ) -> Result<Option<TilePayload>> {
        let Some(query) = self.registry.resolve_parsed(hash) else {
            tracing::debug!(hash = %hash, "Tile request for unknown query hash");
            return Ok(None);
        };
        let db = self.db.clone();
        let geom = self.geom.clone();
        let config = self.config.clone();
        self.run_bounded("tile", move || {
            tile::generate(&db, &query, order, pix, &config, geom.as_ref())
        })
        .await?
    }

    /// Run a CPU-heavy job on the bounded worker pool with the configured
    /// wall-clock limit.
    async fn run_bounded<T, F>(&self, label: &'static str, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let _permit = job_semaphore()
            .acquire()
            .await
            .map_err(|_| EngineError::Internal("worker pool closed".into()))?;

        match tokio::time::timeout(self.config.request_timeout, tokio::task::spawn_blocking(job))
            .await
        {
            Err(_) => {
                tracing::warn!(label, "Request exceeded its time bound");
                Err(EngineError::Timeout(label.to_string()))
            }
            Ok(Err(join_err)) => {
                // A panicking worker is isolated to this request.
                tracing::error!(label, error = %join_err, "Worker failed");
                Err(EngineError::Internal(format!("{label} worker: {join_err}")))
            }
            Ok(Ok(value)) => Ok(value),
        }
    }
}
