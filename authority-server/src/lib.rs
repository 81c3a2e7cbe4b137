//! Proctoring Remote Authority
//!
//! Reference server for the engine's sync protocol. Keeps attempts in
//! memory, applies its own terminate rule and queues proctor directives
//! for heartbeat delivery.
//!
//! # Routes
//!
//! ```text
//! GET  /health                         liveness
//! POST /violation                      -> {action, reason?}
//! POST /state-transition               -> {ack}
//! POST /heartbeat                      -> {serverTime, directives}
//! POST /admin/attempts/:id/terminate   queue a terminate directive
//! GET  /admin/attempts/:id             attempt record
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod store;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
};

pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: store::Store,
    pub config: config::Config,
}

impl AppState {
    pub fn new(config: config::Config) -> Self {
        Self {
            store: store::Store::new(),
            config,
        }
    }
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    // Engine-facing routes
    let engine_routes = Router::new()
        .route("/health", get(handlers::health::check))
        .route("/violation", post(handlers::attempts::report_violation))
        .route("/state-transition", post(handlers::attempts::state_transition))
        .route("/heartbeat", post(handlers::attempts::heartbeat));

    // Proctor routes
    let admin_routes = Router::new()
        .route("/admin/attempts/:id", get(handlers::admin::get))
        .route("/admin/attempts/:id/terminate", post(handlers::admin::terminate));

    Router::new()
        .merge(engine_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
