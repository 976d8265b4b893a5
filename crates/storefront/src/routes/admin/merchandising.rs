//! Back-office merchandising: the olfactory note dictionary and layering
//! duos.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Serialize;
use tracing::instrument;

use rayha_core::catalog::move_item;
use rayha_core::{LayeringDuoId, OlfactoryNoteId, ProductId};

use super::products::MoveRequest;
use crate::db::{LayeringRepository, OlfactoryNoteRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{LayeringDuo, LayeringDuoInput, OlfactoryNote, OlfactoryNoteInput};
use crate::routes::products::NotesQuery;
use crate::state::AppState;

fn normalize_note(input: OlfactoryNoteInput) -> Result<OlfactoryNoteInput> {
    input
        .normalize()
        .map(OlfactoryNoteInput::with_inferred_family)
        .ok_or_else(|| AppError::BadRequest("Le nom de la note est obligatoire".to_owned()))
}

/// Notes, optionally for one pyramid level.
#[instrument(skip(state, _admin))]
pub async fn notes(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<NotesQuery>,
) -> Result<Json<Vec<OlfactoryNote>>> {
    let notes = OlfactoryNoteRepository::new(state.pool())
        .list(query.pyramid)
        .await?;
    Ok(Json(notes))
}

/// Add a note. The family is inferred from the label when not given.
#[instrument(skip(state, _admin, input))]
pub async fn create_note(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Json(input): Json<OlfactoryNoteInput>,
) -> Result<(StatusCode, Json<OlfactoryNote>)> {
    let input = normalize_note(input)?;
    let note = OlfactoryNoteRepository::new(state.pool())
        .create(&input)
        .await?;
    Ok((StatusCode::CREATED, Json(note)))
}

/// Edit a note.
#[instrument(skip(state, _admin, input))]
pub async fn update_note(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<OlfactoryNoteId>,
    Json(input): Json<OlfactoryNoteInput>,
) -> Result<Json<OlfactoryNote>> {
    let input = normalize_note(input)?;
    let note = OlfactoryNoteRepository::new(state.pool())
        .update(id, &input)
        .await?;
    Ok(Json(note))
}

/// Delete a note.
#[instrument(skip(state, _admin))]
pub async fn delete_note(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<OlfactoryNoteId>,
) -> Result<StatusCode> {
    OlfactoryNoteRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct ImportResult {
    pub imported: u64,
}

/// Import the default dictionary. Notes that already exist are skipped.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn import_default_notes(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<Json<ImportResult>> {
    let imported = OlfactoryNoteRepository::new(state.pool())
        .import(&OlfactoryNoteInput::defaults())
        .await?;
    tracing::info!(imported, "Default olfactory notes imported");
    Ok(Json(ImportResult { imported }))
}

/// Check a duo pairs two distinct, existing products.
async fn validate_duo(state: &AppState, input: LayeringDuoInput) -> Result<LayeringDuoInput> {
    let mut input = input;
    input.name = input.name.trim().to_owned();
    if input.name.is_empty() {
        return Err(AppError::BadRequest("Le nom du duo est obligatoire".to_owned()));
    }
    if input.product_id_a == input.product_id_b {
        return Err(AppError::BadRequest(
            "Un duo associe deux parfums différents".to_owned(),
        ));
    }
    if input
        .custom_price
        .is_some_and(|price| price.is_sign_negative() && !price.is_zero())
    {
        return Err(AppError::BadRequest("Le prix ne peut pas être négatif".to_owned()));
    }

    let ids: [ProductId; 2] = [input.product_id_a, input.product_id_b];
    let found = ProductRepository::new(state.pool()).get_many(&ids).await?;
    if found.len() != ids.len() {
        return Err(AppError::BadRequest("Produit introuvable".to_owned()));
    }
    input.description = input
        .description
        .map(|d| d.trim().to_owned())
        .filter(|d| !d.is_empty());
    Ok(input)
}

/// Every duo, in display order.
#[instrument(skip(state, _admin))]
pub async fn duos(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<LayeringDuo>>> {
    Ok(Json(LayeringRepository::new(state.pool()).list().await?))
}

/// Create a duo at the end of the list.
#[instrument(skip(state, _admin, input))]
pub async fn create_duo(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Json(input): Json<LayeringDuoInput>,
) -> Result<(StatusCode, Json<LayeringDuo>)> {
    let input = validate_duo(&state, input).await?;
    let duo = LayeringRepository::new(state.pool()).create(&input).await?;
    state.catalog().invalidate();
    Ok((StatusCode::CREATED, Json(duo)))
}

/// Edit a duo.
#[instrument(skip(state, _admin, input))]
pub async fn update_duo(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<LayeringDuoId>,
    Json(input): Json<LayeringDuoInput>,
) -> Result<Json<LayeringDuo>> {
    let input = validate_duo(&state, input).await?;
    let duo = LayeringRepository::new(state.pool())
        .update(id, &input)
        .await?;
    state.catalog().invalidate();
    Ok(Json(duo))
}

/// Delete a duo.
#[instrument(skip(state, _admin))]
pub async fn delete_duo(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<LayeringDuoId>,
) -> Result<StatusCode> {
    LayeringRepository::new(state.pool()).delete(id).await?;
    state.catalog().invalidate();
    Ok(StatusCode::NO_CONTENT)
}

/// Move a duo one place up or down.
#[instrument(skip(state, _admin))]
pub async fn move_duo(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<LayeringDuoId>,
    Json(req): Json<MoveRequest>,
) -> Result<Json<Vec<LayeringDuo>>> {
    let repo = LayeringRepository::new(state.pool());
    let mut duos = repo.list().await?;
    if !duos.iter().any(|d| d.id == id) {
        return Err(AppError::NotFound("Duo introuvable".to_owned()));
    }

    if move_item(&mut duos, |d| d.id, &id, req.direction) {
        let ids: Vec<LayeringDuoId> = duos.iter().map(|d| d.id).collect();
        repo.set_order(&ids).await?;
        state.catalog().invalidate();
    }
    Ok(Json(repo.list().await?))
}
