//! HTTP endpoint for `serve` mode
//!
//! Exposes `/metrics` (Prometheus text format) and `/health`. The scheduler
//! records the outcome of each tick in [`AppState`] so health checks can see
//! whether the loop is alive.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tower_http::trace::TraceLayer;

use crate::metrics;
use crate::scheduler::TickReport;

/// HTTP server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid bind address '{0}'")]
    InvalidAddress(String),

    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Summary of the most recent tick
#[derive(Debug, Clone, Serialize)]
pub struct LastTick {
    pub finished_at: DateTime<Utc>,
    pub lock_contended: bool,
    pub campaigns: usize,
}

/// Shared state for the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    start_time: Instant,
    last_tick: Arc<Mutex<Option<LastTick>>>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            last_tick: Arc::new(Mutex::new(None)),
        }
    }

    /// Record a finished tick
    pub fn record_tick(&self, report: &TickReport) {
        let summary = LastTick {
            finished_at: Utc::now(),
            lock_contended: matches!(report, TickReport::LockContended),
            campaigns: report.runs().len(),
        };
        *self.last_tick.lock().unwrap_or_else(|e| e.into_inner()) = Some(summary);
    }

    /// Most recent tick, if any has finished
    pub fn last_tick(&self) -> Option<LastTick> {
        self.last_tick
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
    last_tick: Option<LastTick>,
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.start_time.elapsed().as_secs(),
        last_tick: state.last_tick(),
    })
}

async fn metrics_handler() -> impl IntoResponse {
    match metrics::encode_metrics() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Build the router with all routes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve until `shutdown` resolves
pub async fn serve(
    bind_address: &str,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let addr: SocketAddr = bind_address
        .parse()
        .map_err(|_| ServerError::InvalidAddress(bind_address.to_string()))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Metrics endpoint listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Metrics endpoint shut down");
    Ok(())
}
