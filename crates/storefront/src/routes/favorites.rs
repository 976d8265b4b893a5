//! Favorites (wishlist) route handlers. Signed-in shoppers only.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use tracing::instrument;

use rayha_core::ProductId;
use rayha_core::catalog::Product;

use crate::db::WishlistRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// Favorite state of one product after a change.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteStatus {
    pub product_id: ProductId,
    pub favorite: bool,
}

/// The shopper's favorite products, most recently added first.
///
/// Favorites pointing at deleted products are skipped.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Product>>> {
    let ids = WishlistRepository::new(state.pool()).list(user.id).await?;
    let products = state.catalog().products(state.pool()).await?;
    let favorites = ids
        .iter()
        .filter_map(|id| products.iter().find(|p| p.id == *id).cloned())
        .collect();
    Ok(Json(favorites))
}

async fn ensure_product(state: &AppState, product_id: ProductId) -> Result<()> {
    let products = state.catalog().products(state.pool()).await?;
    if products.iter().any(|p| p.id == product_id) {
        Ok(())
    } else {
        Err(AppError::NotFound("Produit introuvable".to_owned()))
    }
}

/// Add a product to favorites. Adding twice is a no-op.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
) -> Result<Json<FavoriteStatus>> {
    ensure_product(&state, product_id).await?;
    WishlistRepository::new(state.pool())
        .add(user.id, product_id)
        .await?;
    Ok(Json(FavoriteStatus {
        product_id,
        favorite: true,
    }))
}

/// Remove a product from favorites.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
) -> Result<Json<FavoriteStatus>> {
    WishlistRepository::new(state.pool())
        .remove(user.id, product_id)
        .await?;
    Ok(Json(FavoriteStatus {
        product_id,
        favorite: false,
    }))
}

/// Flip a product's favorite state.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn toggle(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
) -> Result<Json<FavoriteStatus>> {
    ensure_product(&state, product_id).await?;
    let favorite = WishlistRepository::new(state.pool())
        .toggle(user.id, product_id)
        .await?;
    Ok(Json(FavoriteStatus {
        product_id,
        favorite,
    }))
}
