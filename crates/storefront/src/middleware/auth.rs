//! Authentication middleware and extractors.
//!
//! Provides extractors for requiring a signed-in user, optionally reading
//! one, or requiring the admin role. The session copy of the user is
//! checked against the account's current standing, so deleted accounts are
//! signed out and role changes apply without a new login.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::models::{CurrentUser, session_keys};
use crate::state::AppState;

/// Extractor that requires a signed-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Bonjour, {}!", user.display_name())
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Rejection for the authentication extractors.
#[derive(Debug)]
pub enum AuthRejection {
    /// No user in the session.
    Unauthorized,
    /// Signed in, but not an admin.
    Forbidden,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => {
                AppError::Unauthorized("Vous devez être connecté".to_owned()).into_response()
            }
            Self::Forbidden => {
                AppError::Forbidden("Accès réservé aux administrateurs".to_owned()).into_response()
            }
        }
    }
}

async fn session_user(parts: &Parts, state: &AppState) -> Option<CurrentUser> {
    let session = parts.extensions.get::<Session>()?;
    let user = session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()?;

    let user_id = user.id;
    let refreshed = state.accounts().refresh(state.pool(), user).await;
    if refreshed.is_none() {
        tracing::info!(user_id = %user_id, "Session belongs to a deleted account, signing out");
        if let Err(e) = clear_current_user(session).await {
            tracing::warn!(error = %e, "Failed to clear session of deleted account");
        }
    }
    refreshed
}

impl<S> FromRequestParts<S> for RequireAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        session_user(parts, &AppState::from_ref(state))
            .await
            .map(Self)
            .ok_or(AuthRejection::Unauthorized)
    }
}

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireAuth`, this does not reject the request if nobody is
/// signed in.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(session_user(parts, &AppState::from_ref(state)).await))
    }
}

/// Extractor that requires a signed-in admin.
///
/// Anonymous requests get 401, signed-in customers 403.
pub struct RequireAdmin(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAdmin
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = session_user(parts, &AppState::from_ref(state))
            .await
            .ok_or(AuthRejection::Unauthorized)?;
        if !user.is_admin() {
            tracing::warn!(user_id = %user.id, path = %parts.uri.path(), "Non-admin tried the back-office");
            return Err(AuthRejection::Forbidden);
        }
        Ok(Self(user))
    }
}

/// Helper to set the current user in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CURRENT_USER, user).await?;
    set_sentry_user(&user.id.to_string(), Some(user.email.as_str()));
    Ok(())
}

/// Helper to clear the current user from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentUser>(session_keys::CURRENT_USER)
        .await?;
    clear_sentry_user();
    Ok(())
}
