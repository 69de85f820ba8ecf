//! Per-request access log.
//!
//! Scrape requests are logged at `info` together with the scrape result the
//! metrics handler leaves in the response extensions. Health and index
//! requests only show up at `debug`.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request};
use axum::response::Response;
use tracing::{debug, info};

use crate::auth::AuthUser;

/// Result of the scrape behind a metrics response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ScrapeOutcome {
    /// Failure class, `None` when the scrape succeeded.
    pub(crate) failure: Option<&'static str>,
    pub(crate) duration: Duration,
}

impl ScrapeOutcome {
    pub(crate) fn label(&self) -> &'static str {
        self.failure.unwrap_or("ok")
    }
}

#[derive(Clone)]
pub(crate) struct AccessLogLayer;

impl<S> tower::Layer<S> for AccessLogLayer {
    type Service = AccessLog<S>;
    fn layer(&self, inner: S) -> Self::Service {
        AccessLog { inner }
    }
}

#[derive(Clone)]
pub(crate) struct AccessLog<S> {
    inner: S,
}

fn client_ip(req: &Request) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "-".to_owned())
}

fn user(req: &Request) -> String {
    req.extensions()
        .get::<AuthUser>()
        .map(|u| u.0.clone())
        .unwrap_or_else(|| "-".to_owned())
}

impl<S> tower::Service<Request> for AccessLog<S>
where
    S: tower::Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let method = req.method().clone();
        let path = req.uri().path().to_owned();
        let client = client_ip(&req);
        let user = user(&req);
        let t0 = Instant::now();

        let mut inner = self.inner.clone();
        Box::pin(async move {
            let response = inner.call(req).await?;
            let latency_ms = t0.elapsed().as_millis() as u64;
            let status = response.status().as_u16();

            match response.extensions().get::<ScrapeOutcome>() {
                Some(outcome) => info!(
                    client,
                    user,
                    status,
                    latency_ms,
                    scrape = outcome.label(),
                    scrape_ms = outcome.duration.as_millis() as u64,
                    "{method} {path}"
                ),
                None => debug!(client, user, status, latency_ms, "{method} {path}"),
            }
            Ok(response)
        })
    }
}
