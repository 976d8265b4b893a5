//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Every error is rendered as JSON `{"title": ..., "error": ...}` with French
//! copy, since the storefront is French-speaking.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use rayha_core::inventory::StockError;
use rayha_core::promo::PromoRejection;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::payments::PaymentError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Payment processor call failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Not enough stock to serve the cart.
    #[error("Stock error: {0}")]
    Stock(#[from] StockError),

    /// Promo code refused.
    #[error("Promo error: {0}")]
    Promo(#[from] PromoRejection),

    /// Session store failure.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// An outbound call or checkout took too long.
    #[error("Timed out")]
    Timeout,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub title: &'static str,
    pub error: String,
}

const GENERIC_ERROR: &str = "Une erreur est survenue. Veuillez réessayer.";

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) | Self::Conflict(_) | Self::Stock(_) => {
                StatusCode::CONFLICT
            }
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_) | AuthError::InvalidEmail(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Payment(err) => match err {
                PaymentError::InvalidAmount => StatusCode::BAD_REQUEST,
                PaymentError::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
                PaymentError::Http(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
                PaymentError::Http(_) | PaymentError::Api { .. } | PaymentError::Parse(_) => {
                    StatusCode::BAD_GATEWAY
                }
            },
            Self::Promo(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Client-facing message. Internal details are never exposed.
    fn message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Ressource introuvable".to_owned(),
            Self::Database(RepositoryError::Conflict(msg))
            | Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg) => msg.clone(),
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => GENERIC_ERROR.to_owned(),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::UserNotFound => {
                    "Email ou mot de passe incorrect".to_owned()
                }
                AuthError::UserAlreadyExists => "Un compte existe déjà avec cet email".to_owned(),
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "Adresse email invalide".to_owned(),
                AuthError::Repository(_) | AuthError::PasswordHash => GENERIC_ERROR.to_owned(),
            },
            Self::Payment(err) => match err {
                PaymentError::InvalidAmount => "Montant invalide (minimum 0,50 €)".to_owned(),
                PaymentError::NotConfigured => "Le paiement n'est pas configuré".to_owned(),
                PaymentError::Http(e) if e.is_timeout() => {
                    "Le service de paiement ne répond pas. Veuillez réessayer.".to_owned()
                }
                PaymentError::Http(_) | PaymentError::Api { .. } | PaymentError::Parse(_) => {
                    "Le paiement n'a pas pu être initialisé".to_owned()
                }
            },
            Self::Stock(err) => match err {
                StockError::UnknownProduct(_) => {
                    "Un article de votre panier n'est plus disponible".to_owned()
                }
                StockError::Insufficient {
                    available,
                    requested,
                    ..
                } => format!(
                    "Stock insuffisant : {available} disponible(s) pour {requested} demandé(s)"
                ),
            },
            Self::Promo(rejection) => rejection.to_string(),
            Self::RateLimited => "Trop de requêtes, veuillez patienter".to_owned(),
            Self::Timeout => "Le service met trop de temps à répondre. Veuillez réessayer.".to_owned(),
        }
    }
}

/// Short title shown above the message.
const fn title_for(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 => "Erreur de requête",
        401 => "Authentification requise",
        403 => "Accès refusé",
        404 => "Ressource non trouvée",
        409 => "Conflit",
        429 => "Trop de requêtes",
        502 => "Service externe indisponible",
        504 => "Délai dépassé",
        _ => "Erreur interne",
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = ErrorBody {
            title: title_for(status),
            error: self.message(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "12")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;
    use rust_decimal::Decimal;

    use rayha_core::ProductId;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn body_of(err: AppError) -> serde_json::Value {
        let bytes = to_bytes(err.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(get_status(AppError::Timeout), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_domain_errors_map_to_client_statuses() {
        assert_eq!(
            get_status(AppError::Database(RepositoryError::NotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::Conflict("x".into()))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Stock(StockError::UnknownProduct(ProductId::new(1)))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Promo(PromoRejection::LoginRequired)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Payment(PaymentError::InvalidAmount)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Payment(PaymentError::Api {
                status: 402,
                message: "card_declined".into()
            })),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AppError::Payment(PaymentError::NotConfigured)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_body_carries_title_and_message() {
        let body = body_of(AppError::Unauthorized("Connectez-vous".into())).await;
        assert_eq!(body["title"], "Authentification requise");
        assert_eq!(body["error"], "Connectez-vous");

        let body = body_of(AppError::Promo(PromoRejection::BelowMinimum {
            minimum: Decimal::from(100),
        }))
        .await;
        assert_eq!(body["title"], "Erreur de requête");
        assert_eq!(
            body["error"],
            "Ce code nécessite un panier d'au moins 100 €"
        );
    }

    #[tokio::test]
    async fn test_server_errors_hide_details() {
        let body = body_of(AppError::Internal("connection refused on 10.0.0.3".into())).await;
        assert_eq!(body["title"], "Erreur interne");
        assert_eq!(body["error"], GENERIC_ERROR);

        let body = body_of(AppError::Payment(PaymentError::Api {
            status: 400,
            message: "sk_live_leak".into(),
        }))
        .await;
        assert!(!body["error"].as_str().unwrap().contains("sk_live"));
    }
}
