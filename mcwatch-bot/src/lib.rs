pub mod activity;
pub mod config;
mod error;
pub mod messages;
mod routes;
pub mod validation;

use axum::{Router, http::StatusCode, routing::get};
use mcwatch_core::{Ledger, LedgerStore, PresenceCache};
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub struct AppState<S> {
    pub cache: PresenceCache,
    pub ledger: Arc<Ledger<S>>,
}

/// Create the read-only status router over the shared presence cache and ledger
pub fn create_app<S: LedgerStore>(
    cache: PresenceCache,
    ledger: Arc<Ledger<S>>,
    request_timeout: Duration,
) -> Router {
    let state = Arc::new(AppState { cache, ledger });

    Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .route("/status", get(routes::status::<S>))
        .route("/players/{name}", get(routes::player::<S>))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
