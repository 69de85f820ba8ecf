//! Snapshot retrieval.
//!
//! ```text
//! ┌──────────────────────────────┐
//! │           Scraper            │
//! └──────────────┬───────────────┘
//!                │
//!        ┌───────▼────────┐
//!        │ SnapshotSource │ (trait)
//!        └───────┬────────┘
//!                │
//!        ┌───────┴────────┐
//!        │                │
//! ┌──────▼──────┐  ┌──────▼──────┐
//! │ HttpSource  │  │ MockSource  │
//! │ (device)    │  │ (testing)   │
//! └─────────────┘  └─────────────┘
//! ```
//!
//! ## Production
//!
//! ```ignore
//! use brother_exporter_core::collector::HttpSource;
//!
//! let source = HttpSource::new("http://10.0.0.3/etc/mnt_info.csv", Duration::from_secs(10))?;
//! let body = source.fetch().await?;
//! ```
//!
//! ## Testing
//!
//! ```
//! use brother_exporter_core::collector::MockSource;
//!
//! let source = MockSource::typical_printer();
//! ```

mod http;
pub mod mock;

use std::future::Future;
use std::time::Duration;

pub use http::HttpSource;
pub use mock::MockSource;

/// Error type for snapshot retrieval.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Source configuration rejected (bad URL, zero timeout).
    InvalidConfig(String),
    /// The deadline expired before the body was read.
    Timeout(Duration),
    /// DNS, connect or body read failure.
    Transport(String),
    /// The device answered with a status other than 200.
    Status(u16),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::InvalidConfig(msg) => write!(f, "invalid source: {}", msg),
            FetchError::Timeout(after) => write!(f, "timed out after {:?}", after),
            FetchError::Transport(msg) => write!(f, "{}", msg),
            FetchError::Status(code) => write!(f, "did not get a 200 OK: {}", code),
        }
    }
}

impl std::error::Error for FetchError {}

/// Something that yields one raw CSV snapshot per call.
pub trait SnapshotSource: Send + Sync {
    /// Performs exactly one retrieval; no retry, no caching.
    fn fetch(&self) -> impl Future<Output = Result<String, FetchError>> + Send;

    /// Where the snapshot comes from, for logs.
    fn describe(&self) -> String;
}
