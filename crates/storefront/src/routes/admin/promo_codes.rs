//! Back-office promo codes.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::instrument;

use rayha_core::PromoCodeId;
use rayha_core::promo::{NewPromoCode, PromoCode};

use crate::db::{ProductRepository, PromoCodeRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Every promo code.
#[instrument(skip(state, _admin))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<PromoCode>>> {
    Ok(Json(PromoCodeRepository::new(state.pool()).list().await?))
}

/// Create a promo code.
///
/// The code is upper-cased and must be unique. A gifted product must exist.
#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<NewPromoCode>,
) -> Result<(StatusCode, Json<PromoCode>)> {
    let repo = PromoCodeRepository::new(state.pool());
    let existing = repo.list().await?;
    let input = input
        .validate(existing.iter().map(|p| p.code.as_str()))
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    if let Some(product_id) = input.free_product_id
        && ProductRepository::new(state.pool())
            .get(product_id)
            .await?
            .is_none()
    {
        return Err(AppError::BadRequest(
            "Le produit offert n'existe pas".to_owned(),
        ));
    }

    let promo = repo.create(&input).await?;
    tracing::info!(code = %promo.code, discount = promo.discount, "Promo code created");
    Ok((StatusCode::CREATED, Json(promo)))
}

/// Delete a promo code. Carts holding it drop it on their next refresh.
#[instrument(skip(state, _admin))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<PromoCodeId>,
) -> Result<StatusCode> {
    PromoCodeRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Activate or deactivate a promo code.
#[instrument(skip(state, _admin))]
pub async fn toggle(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<PromoCodeId>,
) -> Result<Json<PromoCode>> {
    let promo = PromoCodeRepository::new(state.pool()).toggle(id).await?;
    tracing::info!(code = %promo.code, active = promo.active, "Promo code toggled");
    Ok(Json(promo))
}
