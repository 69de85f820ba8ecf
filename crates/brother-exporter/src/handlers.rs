//! HTTP request handlers: metrics exposition, health, index.

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::error;

use brother_exporter_core::exposition;
use brother_exporter_core::{ScrapeError, SnapshotSource};

use crate::access_log::ScrapeOutcome;
use crate::state::AppState;

// ============================================================
// Metrics
// ============================================================

/// Runs one scrape and renders it.
///
/// A failed scrape still answers 200 with `brother_scrape_success 0`.
pub(crate) async fn handle_metrics<S: SnapshotSource + 'static>(
    State(state): AppState<S>,
) -> Response {
    let report = state.scraper.scrape_report().await;
    let outcome = ScrapeOutcome {
        failure: report.outcome.as_ref().err().map(ScrapeError::kind),
        duration: report.duration,
    };

    let mut response =
        match exposition::render(state.scraper.schema(), &report, Some(&state.process)) {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, exposition::content_type())],
                body,
            )
                .into_response(),
            Err(e) => {
                error!(error = %e, "failed to render metrics");
                (StatusCode::INTERNAL_SERVER_ERROR, "failed to render metrics").into_response()
            }
        };
    response.extensions_mut().insert(outcome);
    response
}

// ============================================================
// Health
// ============================================================

pub(crate) async fn handle_health() -> &'static str {
    "ok"
}

// ============================================================
// Index
// ============================================================

pub(crate) async fn handle_index<S: SnapshotSource + 'static>(
    State(state): AppState<S>,
) -> String {
    format!(
        "brother-exporter {}\n\nmetrics: {}\nhealth:  /health\ntarget:  {}\n",
        brother_exporter_core::VERSION,
        state.metrics_path,
        state.scraper.source().describe(),
    )
}
