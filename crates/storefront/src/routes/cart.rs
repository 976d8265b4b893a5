//! Cart route handlers.
//!
//! Every mutation answers with the full [`CartView`] so the client can
//! re-render from one response. Guests and signed-in shoppers share these
//! routes; [`CartOwner`] decides where the cart lives.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use rayha_core::ProductId;
use rayha_core::checkout::OrderQuote;

use crate::error::Result;
use crate::middleware::OptionalAuth;
use crate::services::cart::{CartOwner, CartService, CartView};
use crate::state::AppState;

/// Add-to-cart payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

const fn default_quantity() -> u32 {
    1
}

/// Quantity update payload. Zero or less removes the line.
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i64,
}

/// Promo code payload.
#[derive(Debug, Deserialize)]
pub struct PromoRequest {
    pub code: String,
}

fn service<'a>(
    state: &'a AppState,
    session: &'a Session,
    auth: &OptionalAuth,
) -> CartService<'a> {
    CartService::new(state.pool(), session, CartOwner::of(auth.0.as_ref()))
}

/// Show the cart.
#[instrument(skip(state, session, auth))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
) -> Result<Json<CartView>> {
    Ok(Json(service(&state, &session, &auth).view().await?))
}

/// Add a product.
#[instrument(skip(state, session, auth))]
pub async fn add_item(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<CartView>> {
    let cart = service(&state, &session, &auth);
    cart.add(req.product_id, req.quantity).await?;
    Ok(Json(cart.view().await?))
}

/// Change a line's quantity.
#[instrument(skip(state, session, auth))]
pub async fn update_item(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
    Path(product_id): Path<ProductId>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<CartView>> {
    let cart = service(&state, &session, &auth);
    cart.set_quantity(product_id, req.quantity).await?;
    Ok(Json(cart.view().await?))
}

/// Remove a line.
#[instrument(skip(state, session, auth))]
pub async fn remove_item(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
    Path(product_id): Path<ProductId>,
) -> Result<Json<CartView>> {
    let cart = service(&state, &session, &auth);
    cart.remove(product_id).await?;
    Ok(Json(cart.view().await?))
}

/// Empty the cart.
#[instrument(skip(state, session, auth))]
pub async fn clear(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
) -> Result<StatusCode> {
    service(&state, &session, &auth).clear().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Apply a promo code.
#[instrument(skip(state, session, auth, req))]
pub async fn apply_promo(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
    Json(req): Json<PromoRequest>,
) -> Result<Json<CartView>> {
    let cart = service(&state, &session, &auth);
    let applied = cart.apply_promo(&req.code).await?;
    tracing::info!(code = %applied.code, discount = applied.discount, "Promo code applied");
    Ok(Json(cart.view().await?))
}

/// Remove the applied promo code.
#[instrument(skip(state, session, auth))]
pub async fn remove_promo(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
) -> Result<Json<CartView>> {
    let cart = service(&state, &session, &auth);
    cart.remove_promo().await?;
    Ok(Json(cart.view().await?))
}

/// Price the cart as it would be ordered now.
#[instrument(skip(state, session, auth))]
pub async fn quote(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
) -> Result<Json<OrderQuote>> {
    let view = service(&state, &session, &auth).view().await?;
    Ok(Json(view.quote))
}
