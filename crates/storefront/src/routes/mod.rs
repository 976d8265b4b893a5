//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness check
//! GET  /health/ready                    - Readiness check (database)
//!
//! # Catalog
//! GET  /api/products                    - Filtered product list
//! GET  /api/products/featured           - Featured products, in order
//! GET  /api/products/{id}               - Product detail
//! GET  /api/layering                    - Layering duos with their products
//! GET  /api/olfactory-notes             - Note library (?pyramid=)
//!
//! # Cart (guest or account)
//! GET    /api/cart                      - Cart with totals
//! DELETE /api/cart                      - Empty the cart
//! POST   /api/cart/items                - Add a product
//! PATCH  /api/cart/items/{product_id}   - Set a quantity
//! DELETE /api/cart/items/{product_id}   - Remove a line
//! POST   /api/cart/promo                - Apply a promo code
//! DELETE /api/cart/promo                - Remove the promo code
//! GET    /api/cart/quote                - Checkout quote
//!
//! # Favorites (requires auth)
//! GET    /api/favorites
//! POST   /api/favorites/{product_id}
//! DELETE /api/favorites/{product_id}
//! POST   /api/favorites/{product_id}/toggle
//!
//! # Auth (stricter rate limit)
//! POST /api/auth/register
//! POST /api/auth/login
//! POST /api/auth/logout
//! GET  /api/auth/me
//!
//! # Orders and outer surfaces
//! GET  /api/orders                      - Orders of the signed-in user
//! POST /api/checkout                    - Place an order
//! POST /api/payments/intent             - Payment intent proxy
//! POST /api/email/welcome               - Welcome email proxy
//! POST /api/analytics/page-view         - Record a page view
//! GET  /api/events                      - Storefront change feed (SSE)
//!
//! # Back-office (requires admin)
//! /api/admin/...                        - See `admin::routes`
//! ```

pub mod admin;
pub mod analytics;
pub mod auth;
pub mod cart;
pub mod email;
pub mod events;
pub mod favorites;
pub mod orders;
pub mod payments;
pub mod products;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Create the catalog routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/featured", get(products::featured))
        .route("/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add_item))
        .route(
            "/items/{product_id}",
            patch(cart::update_item).delete(cart::remove_item),
        )
        .route(
            "/promo",
            post(cart::apply_promo).delete(cart::remove_promo),
        )
        .route("/quote", get(cart::quote))
}

/// Create the favorites routes router.
pub fn favorite_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(favorites::index))
        .route(
            "/{product_id}",
            post(favorites::add).delete(favorites::remove),
        )
        .route("/{product_id}/toggle", post(favorites::toggle))
}

/// Create the auth routes router.
///
/// Login and registration are the brute-force targets, so this group gets
/// its own stricter limiter on top of the API one.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .layer(auth_rate_limiter())
}

/// Create the `/api` router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/products", product_routes())
        .route("/layering", get(products::layering))
        .route("/olfactory-notes", get(products::olfactory_notes))
        .nest("/cart", cart_routes())
        .nest("/favorites", favorite_routes())
        .nest("/auth", auth_routes())
        .route("/orders", get(orders::mine))
        .route("/checkout", post(orders::checkout))
        .route("/payments/intent", post(payments::create_intent))
        .route("/email/welcome", post(email::welcome))
        .route("/analytics/page-view", post(analytics::page_view))
        .route("/events", get(events::storefront))
        .nest("/admin", admin::routes())
        .layer(api_rate_limiter())
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api", api_routes())
}
