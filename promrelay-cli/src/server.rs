//! HTTP front end: `GET /metrics?target=<name>&exporter=<kind>`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use promrelay_core::{Collector, HopConnector};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::CliError;

/// Content type of the Prometheus text exposition format
pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Debug, Deserialize)]
struct MetricsQuery {
    #[serde(default)]
    target: String,
    #[serde(default)]
    exporter: String,
}

/// Builds the router for a collector
pub fn router<C: HopConnector + 'static>(collector: Arc<Collector<C>>) -> Router {
    Router::new()
        .route("/metrics", get(metrics::<C>))
        .route("/-/healthy", get(healthy))
        .with_state(collector)
}

/// Binds `address` and serves until Ctrl-C or SIGTERM
pub async fn run<C: HopConnector + 'static>(
    address: SocketAddr,
    collector: Arc<Collector<C>>,
) -> Result<(), CliError> {
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|e| CliError::Server(format!("Cannot listen on {address}: {e}")))?;
    info!(%address, "Listening");

    axum::serve(listener, router(collector))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| CliError::Server(e.to_string()))
}

async fn metrics<C: HopConnector + 'static>(
    State(collector): State<Arc<Collector<C>>>,
    Query(query): Query<MetricsQuery>,
) -> impl IntoResponse {
    debug!(target_name = %query.target, exporter = %query.exporter, "Collection requested");
    let body = collector.collect(&query.target, &query.exporter).await;
    ([(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)], body)
}

async fn healthy() -> &'static str {
    "OK"
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("Shutting down");
}
