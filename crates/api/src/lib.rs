//! HTTP API layer with Axum routes.
//!
//! This crate provides:
//! - REST routes for the advance ledger under `/api/v1`
//! - Request/response types (amounts travel as two-decimal strings)
//! - Mapping of ledger errors to `{"error", "message"}` bodies

pub mod routes;

use axum::Router;
use lexledger_core::AdvanceService;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Ledger service over the configured backend.
    pub service: AdvanceService,
}

impl AppState {
    /// Creates the application state.
    #[must_use]
    pub const fn new(service: AdvanceService) -> Self {
        Self { service }
    }
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
