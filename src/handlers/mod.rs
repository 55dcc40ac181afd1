//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (path segments, query string)
//! 2. Delegates to the scanner service
//! 3. Returns HTTP response (JSON, status code)

/// Liveness endpoint
pub mod health;
/// Market scan and ticker diagnosis endpoints
pub mod scans;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the HTTP router with all routes and middleware.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/scans", get(scans::scan_market))
        .route(
            "/api/v1/diagnoses/{symbol}",
            get(scans::diagnose_symbol),
        )
        // Add distributed tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
