//! Payment intent proxy.
//!
//! The browser never sees the processor's secret key: it asks this route for
//! a payment intent and gets back only the client secret.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::services::payments::PaymentIntentRequest;
use crate::state::AppState;

/// Payment intent request as sent by the browser.
///
/// `amount` stays loosely typed so a float or a string is reported as an
/// invalid amount rather than a malformed body.
#[derive(Debug, Deserialize)]
pub struct CreateIntentRequest {
    #[serde(default)]
    pub amount: Option<serde_json::Value>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentResponse {
    pub client_secret: String,
}

/// Create a payment intent.
#[instrument(skip(state, req))]
pub async fn create_intent(
    State(state): State<AppState>,
    Json(req): Json<CreateIntentRequest>,
) -> Result<Json<CreateIntentResponse>> {
    let request = PaymentIntentRequest::from_input(
        req.amount.as_ref(),
        req.currency.as_deref(),
        req.metadata.as_ref(),
    )?;

    let intent = tokio::time::timeout(
        state.config().remote_timeout,
        state.payments().create_intent(&request),
    )
    .await
    .map_err(|_| AppError::Timeout)??;

    tracing::info!(intent_id = %intent.id, amount = request.amount, "Payment intent created");
    Ok(Json(CreateIntentResponse {
        client_secret: intent.client_secret,
    }))
}
