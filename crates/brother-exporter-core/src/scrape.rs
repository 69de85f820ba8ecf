//! The scrape pipeline: fetch → decode → shape check → labels/values/tally.
//!
//! Every call to [`Scraper::scrape`] performs exactly one fetch and builds all
//! of its state locally, so concurrent scrapes share nothing mutable. The
//! only shared pieces are the source and the `Arc<Schema>`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::collector::{FetchError, SnapshotSource};
use crate::labels::LabelSet;
use crate::mapper::{GaugeSample, map_gauges};
use crate::parser::{self, ParseError, RawRow, TypedRow};
use crate::schema::Schema;
use crate::tally::{ErrorSample, ErrorTally};

/// Why a scrape produced no samples.
#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeError {
    /// Retrieval failed (transport, timeout or non-200 status).
    Fetch(FetchError),
    /// The body is not valid CSV.
    Parse(ParseError),
    /// Fewer than two records: no data row after the header.
    NoData { rows: usize },
    /// The data row is shorter than the schema requires.
    Shape { required: usize, found: usize },
}

impl ScrapeError {
    /// Failure class: `transport`, `protocol`, `format` or `shape`.
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::Fetch(FetchError::Status(_)) => "protocol",
            ScrapeError::Fetch(_) => "transport",
            ScrapeError::Parse(_) | ScrapeError::NoData { .. } => "format",
            ScrapeError::Shape { .. } => "shape",
        }
    }
}

impl std::fmt::Display for ScrapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: ", self.kind())?;
        match self {
            ScrapeError::Fetch(e) => write!(f, "{}", e),
            ScrapeError::Parse(e) => write!(f, "{}", e),
            ScrapeError::NoData { rows } => {
                write!(f, "no data: no printer rows found, found {} rows in total", rows)
            }
            ScrapeError::Shape { required, found } => write!(
                f,
                "data row has {} columns, at least {} required",
                found, required
            ),
        }
    }
}

impl std::error::Error for ScrapeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScrapeError::Fetch(e) => Some(e),
            ScrapeError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FetchError> for ScrapeError {
    fn from(e: FetchError) -> Self {
        ScrapeError::Fetch(e)
    }
}

impl From<ParseError> for ScrapeError {
    fn from(e: ParseError) -> Self {
        ScrapeError::Parse(e)
    }
}

/// Everything read from one successful scrape.
#[derive(Debug, Clone)]
pub struct Snapshot {
    schema: Arc<Schema>,
    raw: RawRow,
    typed: TypedRow,
    labels: LabelSet,
    tally: ErrorTally,
}

impl Snapshot {
    /// Builds a snapshot from a CSV body.
    pub fn from_csv(
        schema: Arc<Schema>,
        body: &str,
        skip_empty_codes: bool,
    ) -> Result<Self, ScrapeError> {
        let records = parser::parse_records(body)?;
        let raw = parser::data_row(records)?;
        if raw.len() < schema.width() {
            return Err(ScrapeError::Shape {
                required: schema.width(),
                found: raw.len(),
            });
        }

        let typed = TypedRow::from_raw(&raw);
        let labels = LabelSet::from_row(&raw, schema.label_count())?;
        let tally = ErrorTally::from_row(&schema, &raw, &typed, skip_empty_codes);

        Ok(Self {
            schema,
            raw,
            typed,
            labels,
            tally,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn raw(&self) -> &[String] {
        &self.raw
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn tally(&self) -> &ErrorTally {
        &self.tally
    }

    /// One sample per gauge, in schema order.
    pub fn gauges(&self) -> Vec<GaugeSample<'_>> {
        map_gauges(&self.schema, &self.typed, &self.labels)
    }

    /// One sample per distinct error code.
    pub fn errors(&self) -> Vec<ErrorSample<'_>> {
        self.tally.samples(self.schema.error_metric(), &self.labels)
    }
}

/// Result of one scrape with its wall-clock duration.
#[derive(Debug)]
pub struct ScrapeReport {
    pub outcome: Result<Snapshot, ScrapeError>,
    pub duration: Duration,
}

impl ScrapeReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Runs the pipeline against a snapshot source.
#[derive(Debug, Clone)]
pub struct Scraper<S: SnapshotSource> {
    source: S,
    schema: Arc<Schema>,
    skip_empty_codes: bool,
}

impl<S: SnapshotSource> Scraper<S> {
    pub fn new(source: S, schema: Arc<Schema>) -> Self {
        Self {
            source,
            schema,
            skip_empty_codes: false,
        }
    }

    /// Drops empty error codes instead of reporting them as a `""` code.
    pub fn with_skip_empty_codes(mut self, skip: bool) -> Self {
        self.skip_empty_codes = skip;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Fetches and decodes one snapshot.
    pub async fn scrape(&self) -> Result<Snapshot, ScrapeError> {
        let body = self.source.fetch().await?;
        Snapshot::from_csv(self.schema.clone(), &body, self.skip_empty_codes)
    }

    /// Like [`Scraper::scrape`], timed and logged.
    pub async fn scrape_report(&self) -> ScrapeReport {
        let t0 = Instant::now();
        let outcome = self.scrape().await;
        let duration = t0.elapsed();

        match &outcome {
            Ok(snapshot) => debug!(
                source = %self.source.describe(),
                gauges = self.schema.gauges().count(),
                errors = snapshot.tally().len(),
                latency_ms = duration.as_millis() as u64,
                "scrape ok"
            ),
            Err(e) => warn!(
                source = %self.source.describe(),
                kind = e.kind(),
                latency_ms = duration.as_millis() as u64,
                "scrape failed: {}", e
            ),
        }

        ScrapeReport { outcome, duration }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::MockSource;
    use crate::collector::mock::{TYPICAL_LABELS, brother_csv, brother_row};

    fn scraper(source: MockSource) -> Scraper<MockSource> {
        Scraper::new(source, Arc::new(Schema::brother().unwrap()))
    }

    #[tokio::test]
    async fn test_scrape_typical_printer() {
        let scraper = scraper(MockSource::typical_printer());
        let snapshot = scraper.scrape().await.unwrap();

        let gauges = snapshot.gauges();
        assert_eq!(gauges.len(), 33);
        assert_eq!(gauges[0].value, 0.0);
        assert_eq!(gauges[32].value, 32.0);
        assert_eq!(snapshot.labels().values()[2], "Office, 2nd floor");

        // Two real codes plus the empty unused slots.
        assert_eq!(snapshot.errors().len(), 3);
        assert_eq!(snapshot.tally().get("Replace Toner"), Some(3.0));
        assert_eq!(snapshot.tally().get("Paper Jam"), Some(1.0));
        assert_eq!(scraper.source().calls(), 1);
    }

    #[tokio::test]
    async fn test_scrape_skip_empty_codes() {
        let scraper = scraper(MockSource::typical_printer()).with_skip_empty_codes(true);
        let snapshot = scraper.scrape().await.unwrap();

        assert_eq!(snapshot.errors().len(), 2);
    }

    #[tokio::test]
    async fn test_scrape_header_only_is_no_data() {
        let err = scraper(MockSource::header_only()).scrape().await.unwrap_err();

        assert_eq!(err, ScrapeError::NoData { rows: 1 });
        assert_eq!(err.kind(), "format");
        assert!(err.to_string().contains("found 1 rows"));
    }

    #[tokio::test]
    async fn test_scrape_truncated_row_is_shape() {
        let err = scraper(MockSource::truncated_row()).scrape().await.unwrap_err();

        assert_eq!(
            err,
            ScrapeError::Shape {
                required: 61,
                found: 41
            }
        );
        assert_eq!(err.kind(), "shape");
    }

    #[tokio::test]
    async fn test_scrape_timeout_is_transport() {
        let scraper = scraper(MockSource::unreachable(Duration::from_secs(10)));
        let err = scraper.scrape().await.unwrap_err();

        assert_eq!(err.kind(), "transport");
        assert!(matches!(err, ScrapeError::Fetch(FetchError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_scrape_status_is_protocol() {
        let scraper = scraper(MockSource::failing(FetchError::Status(500)));
        let err = scraper.scrape().await.unwrap_err();

        assert_eq!(err.kind(), "protocol");
        assert_eq!(err.to_string(), "protocol: did not get a 200 OK: 500");
    }

    #[tokio::test]
    async fn test_scrape_bad_quoting_is_format() {
        let scraper = scraper(MockSource::new("h1,h2\n\"open,value\n"));
        let err = scraper.scrape().await.unwrap_err();

        assert_eq!(err.kind(), "format");
        assert!(matches!(err, ScrapeError::Parse(_)));
    }

    #[tokio::test]
    async fn test_scrape_row_narrower_than_header_is_format() {
        let full = brother_csv(&brother_row(&TYPICAL_LABELS, |i| i.to_string(), &[]));
        let mut short = brother_row(&TYPICAL_LABELS, |i| i.to_string(), &[]);
        short.truncate(41);
        let short = brother_csv(&short);
        let body = format!(
            "{}\n{}\n",
            full.lines().next().unwrap(),
            short.lines().nth(1).unwrap()
        );

        let err = scraper(MockSource::new(body)).scrape().await.unwrap_err();

        assert_eq!(err.kind(), "format");
        assert!(err.to_string().contains("wrong number of fields"), "{err}");
    }

    #[tokio::test]
    async fn test_scrape_report_times_failures() {
        let scraper = scraper(MockSource::header_only());
        let report = scraper.scrape_report().await;

        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn test_each_scrape_fetches_once() {
        let scraper = scraper(MockSource::typical_printer());
        let (a, b) = tokio::join!(scraper.scrape(), scraper.scrape());

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(scraper.source().calls(), 2);
    }

    #[test]
    fn test_snapshot_labels_verbatim_with_extra_columns() {
        let mut row = brother_row(&TYPICAL_LABELS, |i| format!("{i}.5"), &[]);
        row.push("trailing".to_string());
        let snapshot =
            Snapshot::from_csv(Arc::new(Schema::brother().unwrap()), &brother_csv(&row), false).unwrap();

        assert_eq!(snapshot.labels().values(), &row[..8]);
        assert_eq!(snapshot.gauges()[1].value, 1.5);
        assert_eq!(snapshot.raw().len(), 62);
    }
}
