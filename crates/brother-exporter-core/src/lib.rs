//! brother-exporter-core: scrape-and-map pipeline for Brother printer metrics.
//!
//! Provides:
//! - `schema`: fixed column layout of the device CSV (labels, gauges, error slots)
//! - `collector`: snapshot sources (`HttpSource` for the device, `MockSource` for tests)
//! - `parser`: CSV decoding, data row selection, numeric coercion
//! - `labels`: identity label set shared by every sample
//! - `mapper`: one gauge sample per configured column
//! - `tally`: deduplicated error code → count aggregation
//! - `scrape`: the fetch → parse → map pipeline and its error taxonomy
//! - `exposition`: Prometheus text rendering of a scrape

pub mod collector;
pub mod exposition;
pub mod labels;
pub mod mapper;
pub mod parser;
pub mod schema;
pub mod scrape;
pub mod tally;

pub use collector::{FetchError, HttpSource, MockSource, SnapshotSource};
pub use schema::Schema;
pub use scrape::{ScrapeError, ScrapeReport, Scraper, Snapshot};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
