//! Rayha Store storefront library.
//!
//! This crate provides the JSON storefront and back-office API as a library,
//! allowing it to be tested and reused by the binary and the CLI.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

#[cfg(test)]
mod test_fixtures;

use axum::{Router, middleware::from_fn};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tower_sessions::{SessionManagerLayer, SessionStore};

use crate::state::AppState;

/// Build the application router with every layer except Sentry.
///
/// The session store is chosen by the caller: `PostgreSQL` in production,
/// in-memory in tests.
pub fn app<S: SessionStore + Clone>(state: AppState, sessions: SessionManagerLayer<S>) -> Router {
    let cors = middleware::cors_layer(state.config());

    // Outermost first
    let layers = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(middleware::request_id_middleware))
        .layer(sessions)
        .layer(cors)
        .layer(from_fn(middleware::security_headers_middleware));

    Router::new()
        .merge(routes::routes())
        .layer(layers)
        .with_state(state)
}
