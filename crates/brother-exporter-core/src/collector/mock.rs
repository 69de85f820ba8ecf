//! In-memory snapshot source for testing the pipeline without a printer.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{FetchError, SnapshotSource};
use crate::schema::{BROTHER_GAUGES, BROTHER_LABELS};

/// Canned snapshot source.
///
/// Every `fetch` returns the same configured outcome, optionally after a
/// delay, and bumps a shared call counter.
#[derive(Debug, Clone)]
pub struct MockSource {
    response: Result<String, FetchError>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl MockSource {
    /// A source that always returns `body`.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            response: Ok(body.into()),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A source that always fails with `error`.
    pub fn failing(error: FetchError) -> Self {
        Self {
            response: Err(error),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of fetches performed so far (shared between clones).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl SnapshotSource for MockSource {
    fn fetch(&self) -> impl Future<Output = Result<String, FetchError>> + Send {
        async move {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.response.clone()
        }
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

/// Builds a Brother-layout data row (61 cells).
///
/// Gauges take `gauge(i)` for the i-th gauge, error slots are filled from
/// `errors` in order and left empty with a zero count afterwards.
pub fn brother_row(
    labels: &[&str; 8],
    gauge: impl Fn(usize) -> String,
    errors: &[(&str, &str)],
) -> Vec<String> {
    let mut row: Vec<String> = labels.iter().map(|s| s.to_string()).collect();
    row.extend((0..BROTHER_GAUGES.len()).map(gauge));
    let mut codes = Vec::with_capacity(10);
    let mut counts = Vec::with_capacity(10);
    for i in 0..10 {
        let (code, count) = errors.get(i).copied().unwrap_or(("", "0"));
        codes.push(code.to_string());
        counts.push(count.to_string());
    }
    row.extend(codes);
    row.extend(counts);
    row
}

/// Renders a header plus the given data row as a CSV body.
///
/// The header is cut or padded to the row's width so the body stays
/// well-formed; an empty row yields the full header alone.
pub fn brother_csv(row: &[String]) -> String {
    let mut header: Vec<String> = BROTHER_LABELS.iter().map(|s| s.to_string()).collect();
    header.extend(BROTHER_GAUGES.iter().map(|s| s.to_string()));
    header.extend((1..=10).map(|i| format!("Error Message {i}")));
    header.extend((1..=10).map(|i| format!("Error Count {i}")));
    if !row.is_empty() {
        header.truncate(row.len());
        let missing = row.len() - header.len();
        header.extend((1..=missing).map(|i| format!("Extra {i}")));
    }

    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .map(|c| {
                if c.contains(',') || c.contains('"') || c.contains('\n') {
                    format!("\"{}\"", c.replace('"', "\"\""))
                } else {
                    c.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(",")
    };

    format!("{}\r\n{}\r\n", line(&header), line(row))
}

/// Identity labels used by the scenarios.
pub const TYPICAL_LABELS: [&str; 8] = [
    "BRN001",
    "Brother HL-L2350DW series",
    "Office, 2nd floor",
    "it@example.com",
    "10.0.0.3",
    "E78123A4N567890",
    "ZC",
    "1.04",
];

impl MockSource {
    /// A healthy printer: gauge `i` reads `i`, two active errors.
    pub fn typical_printer() -> Self {
        let row = brother_row(
            &TYPICAL_LABELS,
            |i| i.to_string(),
            &[("Replace Toner", "3"), ("Paper Jam", "1")],
        );
        Self::new(brother_csv(&row))
    }

    /// Only the header line, no data row.
    pub fn header_only() -> Self {
        Self::new(brother_csv(&[]))
    }

    /// A device whose CSV stops after the gauges, header included.
    pub fn truncated_row() -> Self {
        let mut row = brother_row(&TYPICAL_LABELS, |i| i.to_string(), &[]);
        row.truncate(41);
        Self::new(brother_csv(&row))
    }

    /// A device that never answers in time.
    pub fn unreachable(timeout: Duration) -> Self {
        Self::failing(FetchError::Timeout(timeout))
    }
}
