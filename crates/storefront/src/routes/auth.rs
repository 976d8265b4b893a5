//! Authentication route handlers.
//!
//! Email and password accounts. Signing in folds the session's guest cart
//! into the account and rotates the session id.

use axum::{Json, extract::State, http::StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{OptionalAuth, clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::services::auth::{AuthError, AuthService};
use crate::services::cart::merge_guest_cart;
use crate::state::AppState;

/// Registration payload.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: SecretString,
    #[serde(default)]
    pub username: Option<String>,
}

/// Login payload.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: SecretString,
}

/// Put `user` in the session and bring the guest cart along.
async fn sign_in(state: &AppState, session: &Session, user: &User) -> Result<()> {
    session.cycle_id().await?;
    set_current_user(session, &CurrentUser::from(user)).await?;
    merge_guest_cart(state.pool(), session, user.id).await?;
    add_breadcrumb("auth", "Signed in", Some(&[("user_id", &user.id.to_string())]));
    Ok(())
}

/// Create an account and sign in.
#[instrument(skip(state, session, req), fields(email = %req.email))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>)> {
    let user = AuthService::new(state.pool())
        .register(
            &req.email,
            req.password.expose_secret(),
            req.username.as_deref(),
        )
        .await?;
    sign_in(&state, &session, &user).await?;
    tracing::info!(user_id = %user.id, "Account created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// Sign in with email and password.
#[instrument(skip(state, session, req), fields(email = %req.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<LoginRequest>,
) -> Result<Json<User>> {
    let user = match AuthService::new(state.pool())
        .login(&req.email, req.password.expose_secret())
        .await
    {
        Ok(user) => user,
        Err(e @ AuthError::InvalidCredentials) => {
            tracing::warn!("Failed login attempt");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };
    sign_in(&state, &session, &user).await?;
    Ok(Json(user))
}

/// Sign out. The guest cart and applied promo stay with the session.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session).await?;
    session.cycle_id().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The signed-in user, re-read from the database.
///
/// A deleted account signs the session out. A changed role is picked up.
#[instrument(skip(state, session, auth))]
pub async fn me(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
) -> Result<Json<User>> {
    let current = auth
        .0
        .ok_or_else(|| AppError::Unauthorized("Vous devez être connecté".to_owned()))?;

    match AuthService::new(state.pool()).get_user(current.id).await {
        Ok(user) => {
            let fresh = CurrentUser::from(&user);
            if fresh != current {
                set_current_user(&session, &fresh).await?;
            }
            Ok(Json(user))
        }
        Err(AuthError::UserNotFound) => {
            clear_current_user(&session).await?;
            Err(AppError::Unauthorized(
                "Votre compte n'existe plus".to_owned(),
            ))
        }
        Err(e) => Err(e.into()),
    }
}
