//! Back-office account management.

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use tracing::instrument;

use rayha_core::UserId;

use crate::db::UserRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Delete an account with its cart and favorites. Orders are kept.
///
/// Open sessions of the account are signed out on their next request.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
) -> Result<StatusCode> {
    if id == admin.id {
        return Err(AppError::BadRequest(
            "Vous ne pouvez pas supprimer votre propre compte".to_owned(),
        ));
    }
    UserRepository::new(state.pool()).delete_with_data(id).await?;
    state.accounts().mark_deleted(id).await;
    tracing::info!(user_id = %id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}
