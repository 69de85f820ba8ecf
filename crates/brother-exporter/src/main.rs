mod access_log;
mod auth;
mod handlers;
mod state;

use std::net::SocketAddr;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use clap::Parser;
use tower_http::compression::CompressionLayer;
use tracing::{error, info};

use brother_exporter_core::exposition::process_registry;
use brother_exporter_core::{HttpSource, Schema, Scraper, SnapshotSource};

use access_log::AccessLogLayer;
use auth::Credentials;
use state::{AppInner, SharedState};

// ============================================================
// CLI
// ============================================================

#[derive(Parser)]
#[command(
    name = "brother-exporter",
    about = "Prometheus exporter for Brother printer maintenance counters",
    version = brother_exporter_core::VERSION
)]
struct Args {
    /// IP address or host name of the printer.
    #[arg(long, default_value = "10.0.0.3", env = "BROTHER_ADDRESS")]
    address: String,

    /// Path of the maintenance CSV on the printer.
    #[arg(
        long,
        alias = "csvURL",
        default_value = "etc/mnt_info.csv",
        env = "BROTHER_CSV_PATH"
    )]
    csv_path: String,

    /// Timeout in seconds for fetching the CSV.
    #[arg(
        long,
        default_value = "10",
        env = "BROTHER_TIMEOUT",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout: u64,

    /// Listen address.
    #[arg(long, default_value = "0.0.0.0:8080", env = "BROTHER_LISTEN")]
    listen: String,

    /// Path serving the metrics.
    #[arg(long, default_value = "/metrics", env = "BROTHER_METRICS_PATH")]
    metrics_path: String,

    /// Drop empty error codes instead of exporting them with `error_message=""`.
    #[arg(long, env = "BROTHER_SKIP_EMPTY_ERROR_CODES")]
    skip_empty_error_codes: bool,

    /// Never send the printer two requests at once; concurrent scrapes queue.
    #[arg(long, env = "BROTHER_SERIALIZE_FETCHES")]
    serialize_fetches: bool,

    /// Basic Auth username. If set, --auth-password is also required.
    #[arg(long, env = "BROTHER_AUTH_USER")]
    auth_user: Option<String>,

    /// Basic Auth password.
    #[arg(long, env = "BROTHER_AUTH_PASSWORD")]
    auth_password: Option<String>,
}

// ============================================================
// Main
// ============================================================

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("brother_exporter=info,brother_exporter_core=info")
            }),
        )
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            process::exit(1);
        }
    };
    runtime.block_on(async_main(args));
}

async fn async_main(args: Args) {
    let timeout = Duration::from_secs(args.timeout);
    let mut source = match HttpSource::for_device(&args.address, &args.csv_path, timeout) {
        Ok(source) => source,
        Err(e) => {
            error!(address = %args.address, csv_path = %args.csv_path, error = %e, "invalid target");
            process::exit(1);
        }
    };
    if args.serialize_fetches {
        source = source.serialized();
    }

    let credentials: Option<Credentials> = match (args.auth_user, args.auth_password) {
        (Some(user), Some(pass)) => {
            info!("basic auth enabled");
            Some(Arc::new((user, pass)))
        }
        (Some(_), None) | (None, Some(_)) => {
            error!("--auth-user and --auth-password must both be set");
            process::exit(1);
        }
        _ => None,
    };

    let metrics_path = normalize_path(&args.metrics_path);
    info!(
        version = brother_exporter_core::VERSION,
        target = %source.url(),
        timeout = ?timeout,
        metrics_path = %metrics_path,
        "starting"
    );

    let schema = match Schema::brother() {
        Ok(schema) => Arc::new(schema),
        Err(e) => {
            error!(error = %e, "invalid schema");
            process::exit(1);
        }
    };
    let scraper = Scraper::new(source, schema)
        .with_skip_empty_codes(args.skip_empty_error_codes);
    let state = Arc::new(AppInner {
        scraper,
        process: process_registry(),
        metrics_path,
    });

    let app = build_router(state, credentials).into_make_service_with_connect_info::<SocketAddr>();

    let addr: SocketAddr = match args.listen.parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!(listen = %args.listen, error = %e, "invalid listen address");
            process::exit(1);
        }
    };
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%addr, error = %e, "failed to bind");
            process::exit(1);
        }
    };
    info!(%addr, "listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "server error");
        process::exit(1);
    }
    info!("stopped");
}

fn build_router<S: SnapshotSource + 'static>(
    state: SharedState<S>,
    credentials: Option<Credentials>,
) -> Router {
    let mut app = Router::new()
        .route(&state.metrics_path, get(handlers::handle_metrics::<S>))
        .route("/health", get(handlers::handle_health));
    if state.metrics_path != "/" {
        app = app.route("/", get(handlers::handle_index::<S>));
    }
    let mut app = app.with_state(state).layer(AccessLogLayer);

    if let Some(creds) = credentials {
        app = app.layer(axum::middleware::from_fn_with_state(
            creds,
            auth::basic_auth_middleware,
        ));
    }

    app.layer(CompressionLayer::new())
}

/// Ensures the metrics path starts with a single `/`.
fn normalize_path(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
