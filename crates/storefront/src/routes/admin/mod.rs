//! Back-office API. Every handler requires the admin role.

pub mod abandoned_carts;
pub mod analytics;
pub mod merchandising;
pub mod orders;
pub mod products;
pub mod promo_codes;
pub mod users;

use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};

use super::events;
use crate::state::AppState;

/// Create the back-office router, mounted under `/api/admin`.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Catalog
        .route("/products", get(products::index).post(products::create))
        .route(
            "/products/{id}",
            patch(products::update).delete(products::delete),
        )
        .route("/products/{id}/stock", put(products::set_stock))
        .route("/products/{id}/velocity", put(products::set_velocity))
        .route(
            "/featured",
            get(products::featured).put(products::set_featured),
        )
        .route("/featured/{id}/move", post(products::move_featured))
        // Orders
        .route("/orders", get(orders::index))
        .route("/orders/{id}/status", patch(orders::update_status))
        .route("/orders/{id}", delete(orders::delete))
        // Abandoned carts
        .route(
            "/abandoned-carts",
            get(abandoned_carts::index).post(abandoned_carts::record),
        )
        .route("/abandoned-carts/stats", get(abandoned_carts::stats))
        .route("/abandoned-carts/insights", get(abandoned_carts::insights))
        .route(
            "/abandoned-carts/{id}/recovery-email",
            post(abandoned_carts::recovery_email),
        )
        .route(
            "/abandoned-carts/{id}/recovered",
            post(abandoned_carts::mark_recovered),
        )
        // Promo codes
        .route(
            "/promo-codes",
            get(promo_codes::index).post(promo_codes::create),
        )
        .route("/promo-codes/{id}", delete(promo_codes::delete))
        .route("/promo-codes/{id}/toggle", post(promo_codes::toggle))
        // Merchandising
        .route(
            "/olfactory-notes",
            get(merchandising::notes).post(merchandising::create_note),
        )
        .route(
            "/olfactory-notes/import-defaults",
            post(merchandising::import_default_notes),
        )
        .route(
            "/olfactory-notes/{id}",
            patch(merchandising::update_note).delete(merchandising::delete_note),
        )
        .route(
            "/layering",
            get(merchandising::duos).post(merchandising::create_duo),
        )
        .route(
            "/layering/{id}",
            patch(merchandising::update_duo).delete(merchandising::delete_duo),
        )
        .route("/layering/{id}/move", post(merchandising::move_duo))
        // Accounts and reporting
        .route("/users/{id}", delete(users::delete))
        .route("/analytics", get(analytics::summary))
        .route("/events", get(events::admin))
}
