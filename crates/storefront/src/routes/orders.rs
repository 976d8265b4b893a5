//! Order history and checkout.

use axum::{Json, extract::State, http::StatusCode};
use tower_sessions::Session;
use tracing::instrument;

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::Order;
use crate::services::checkout::{CheckoutRequest, place_order};
use crate::state::AppState;

/// The signed-in shopper's orders, newest first.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn mine(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(Json(orders))
}

/// Turn the cart into an order.
///
/// Guests may check out; their order is not linked to an account.
#[instrument(skip(state, session, auth, req))]
pub async fn checkout(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let order = tokio::time::timeout(
        state.config().remote_timeout,
        place_order(state.pool(), &session, auth.0.as_ref(), req),
    )
    .await
    .map_err(|_| {
        tracing::warn!("Checkout timed out");
        AppError::Timeout
    })??;

    Ok((StatusCode::CREATED, Json(order)))
}
