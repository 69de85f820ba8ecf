//! Prometheus text exposition of a scrape.
//!
//! A fresh registry is built for every scrape, so a sample only appears in
//! the output of the scrape that produced it. Failed scrapes expose just the
//! success indicator and the duration.

use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};

use crate::scrape::ScrapeReport;
use crate::schema::Schema;

/// 1 when the device snapshot was fetched and decoded, 0 otherwise.
pub const SCRAPE_SUCCESS: &str = "brother_scrape_success";

/// Wall-clock time spent fetching and decoding the snapshot.
pub const SCRAPE_DURATION: &str = "brother_scrape_duration_seconds";

/// Content type of the rendered text.
pub fn content_type() -> String {
    TextEncoder::new().format_type().to_string()
}

/// Renders `report` as Prometheus text, followed by the families of `extra`.
pub fn render(
    schema: &Schema,
    report: &ScrapeReport,
    extra: Option<&Registry>,
) -> Result<String, prometheus::Error> {
    let registry = Registry::new();

    let success = Gauge::with_opts(Opts::new(
        SCRAPE_SUCCESS,
        "Whether the device snapshot was fetched and decoded (1) or not (0).",
    ))?;
    registry.register(Box::new(success.clone()))?;
    success.set(if report.is_success() { 1.0 } else { 0.0 });

    let duration = Gauge::with_opts(Opts::new(
        SCRAPE_DURATION,
        "Time spent fetching and decoding the device snapshot.",
    ))?;
    registry.register(Box::new(duration.clone()))?;
    duration.set(report.duration.as_secs_f64());

    if let Ok(snapshot) = &report.outcome {
        let label_names: Vec<&str> = schema.label_names().collect();
        let label_values: Vec<&str> = snapshot
            .labels()
            .values()
            .iter()
            .map(String::as_str)
            .collect();

        for sample in snapshot.gauges() {
            let help = format!("Device value from CSV column {}.", sample.position);
            let gauge = GaugeVec::new(Opts::new(sample.name, help), &label_names)?;
            registry.register(Box::new(gauge.clone()))?;
            gauge.with_label_values(&label_values).set(sample.value);
        }

        let errors = snapshot.errors();
        if !errors.is_empty() {
            let mut error_label_names = label_names.clone();
            error_label_names.push(schema.error_label());
            let gauge = GaugeVec::new(
                Opts::new(
                    schema.error_metric(),
                    "Latest count reported by the device per error code.",
                ),
                &error_label_names,
            )?;
            registry.register(Box::new(gauge.clone()))?;
            for sample in errors {
                gauge
                    .with_label_values(&sample.labels.extended(sample.code))
                    .set(sample.value);
            }
        }
    }

    let mut families = registry.gather();
    if let Some(extra) = extra {
        families.extend(extra.gather());
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Registry with the exporter's own process metrics (`process_*`).
///
/// Empty where the process collector is unavailable.
pub fn process_registry() -> Registry {
    let registry = Registry::new();
    #[cfg(all(feature = "process", target_os = "linux"))]
    {
        let collector = prometheus::process_collector::ProcessCollector::for_self();
        if let Err(e) = registry.register(Box::new(collector)) {
            tracing::warn!(error = %e, "process metrics unavailable");
        }
    }
    registry
}
