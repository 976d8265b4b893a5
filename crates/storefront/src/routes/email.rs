//! Transactional email proxy.
//!
//! This route keeps the email provider's contract: provider failures are
//! passed through with the provider's status and its error document instead
//! of the usual `{title, error}` shape.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use crate::services::mailer::MailerError;
use crate::state::AppState;

/// Welcome email request.
#[derive(Debug, Deserialize)]
pub struct WelcomeRequest {
    #[serde(default)]
    pub email: Option<String>,
}

fn error_response(status: StatusCode, error: impl Into<Value>) -> Response {
    (status, Json(json!({ "error": error.into() }))).into_response()
}

/// The provider's error body as JSON, or as a plain string when it is not.
fn provider_error(body: String) -> Value {
    serde_json::from_str(&body).unwrap_or(Value::String(body))
}

/// Send the welcome email.
#[instrument(skip(state, req))]
pub async fn welcome(State(state): State<AppState>, Json(req): Json<WelcomeRequest>) -> Response {
    let Some(email) = req
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
    else {
        return error_response(StatusCode::BAD_REQUEST, "Email requis");
    };

    match state.mailer().send_welcome(email).await {
        Ok(id) => {
            tracing::info!(email_id = %id, "Welcome email sent");
            Json(json!({ "success": true, "id": id })).into_response()
        }
        Err(MailerError::NotConfigured) => {
            tracing::error!("Welcome email requested but no email API key is configured");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Service d'email non configuré",
            )
        }
        Err(MailerError::Api { status, body }) => {
            tracing::warn!(status, "Email provider refused the message");
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            error_response(status, provider_error(body))
        }
        Err(e) => {
            let event_id = sentry::capture_error(&e);
            tracing::error!(error = %e, sentry_event_id = %event_id, "Welcome email failed");
            error_response(StatusCode::BAD_GATEWAY, "Impossible d'envoyer l'email")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_keeps_json_documents() {
        let error = provider_error(r#"{"statusCode":422,"message":"Invalid `to` field"}"#.to_owned());
        assert_eq!(error["statusCode"], 422);
        assert_eq!(error["message"], "Invalid `to` field");
    }

    #[test]
    fn test_provider_error_falls_back_to_text() {
        assert_eq!(
            provider_error("Bad Gateway".to_owned()),
            Value::String("Bad Gateway".to_owned())
        );
        assert_eq!(provider_error(String::new()), Value::String(String::new()));
    }
}
