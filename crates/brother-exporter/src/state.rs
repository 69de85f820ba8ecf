//! Shared application state and the global allocator.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::sync::Arc;

use axum::extract::State;
use prometheus::Registry;

use brother_exporter_core::{Scraper, SnapshotSource};

/// Read-only state shared by all requests. Each scrape builds its own
/// per-request state, so nothing here needs a lock.
pub(crate) struct AppInner<S: SnapshotSource> {
    pub(crate) scraper: Scraper<S>,
    /// Exporter process metrics appended to every exposition.
    pub(crate) process: Registry,
    pub(crate) metrics_path: String,
}

pub(crate) type SharedState<S> = Arc<AppInner<S>>;
pub(crate) type AppState<S> = State<SharedState<S>>;
