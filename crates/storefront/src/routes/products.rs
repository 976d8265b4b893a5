//! Catalog route handlers.
//!
//! Product listings come from the in-memory catalog cache, which the change
//! feed keeps fresh.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::header::CACHE_CONTROL,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

use rayha_core::catalog::{Product, ProductFilter};
use rayha_core::{ProductId, Pyramid};

use crate::db::OlfactoryNoteRepository;
use crate::error::{AppError, Result};
use crate::models::{LayeringDuoView, OlfactoryNote};
use crate::state::AppState;

/// Catalog responses may be cached briefly by the browser.
const CATALOG_CACHE_CONTROL: (axum::http::HeaderName, &str) =
    (CACHE_CONTROL, "public, max-age=60");

/// List products, optionally filtered.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> Result<impl IntoResponse> {
    let products = state.catalog().products(state.pool()).await?;
    let matching: Vec<Product> = products
        .iter()
        .filter(|p| filter.matches(p))
        .cloned()
        .collect();
    Ok(([CATALOG_CACHE_CONTROL], Json(matching)))
}

/// Show one product.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    let products = state.catalog().products(state.pool()).await?;
    products
        .iter()
        .find(|p| p.id == id)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Produit introuvable".to_owned()))
}

/// The curated "Notre Sélection" products, in display order.
#[instrument(skip(state))]
pub async fn featured(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let featured = state.catalog().featured(state.pool()).await?;
    Ok(([CATALOG_CACHE_CONTROL], Json(featured.as_ref().clone())))
}

/// Active layering duos with both products resolved.
#[instrument(skip(state))]
pub async fn layering(State(state): State<AppState>) -> Result<Json<Vec<LayeringDuoView>>> {
    let duos = state.catalog().layering(state.pool()).await?;
    Ok(Json(duos.as_ref().clone()))
}

/// Query parameters for the notes listing.
#[derive(Debug, Deserialize)]
pub struct NotesQuery {
    pub pyramid: Option<Pyramid>,
}

/// Olfactory notes, optionally for one level of the pyramid.
#[instrument(skip(state))]
pub async fn olfactory_notes(
    State(state): State<AppState>,
    Query(query): Query<NotesQuery>,
) -> Result<Json<Vec<OlfactoryNote>>> {
    let notes = OlfactoryNoteRepository::new(state.pool())
        .list(query.pyramid)
        .await?;
    Ok(Json(notes))
}
