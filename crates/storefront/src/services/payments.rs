//! Payment processor client (Stripe-compatible REST API).
//!
//! Only payment intent creation is needed: the browser confirms the payment
//! itself with the returned client secret.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use rayha_core::money::{CURRENCY, MINIMUM_CHARGE_CENTS};

use crate::config::PaymentsConfig;

/// Errors that can occur when talking to the payment processor.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// No secret key configured.
    #[error("payment processor is not configured")]
    NotConfigured,

    /// Amount missing, not an integer, or below the processor minimum.
    #[error("invalid amount")]
    InvalidAmount,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Largest integer a JSON number holds exactly as a double.
const MAX_EXACT_CENTS: f64 = 9_007_199_254_740_991.0;

/// An integer amount, written either as `5000` or `5000.0`.
#[allow(clippy::cast_possible_truncation)]
fn whole_cents(value: &serde_json::Value) -> Option<i64> {
    if let Some(cents) = value.as_i64() {
        return Some(cents);
    }
    value
        .as_f64()
        .filter(|f| f.fract() == 0.0 && f.abs() <= MAX_EXACT_CENTS)
        .map(|f| f as i64)
}

/// A payment intent to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntentRequest {
    /// Amount in cents.
    pub amount: i64,
    pub currency: String,
    pub metadata: BTreeMap<String, String>,
}

impl PaymentIntentRequest {
    /// Build a request from loosely typed client input.
    ///
    /// `amount` must be an integer number of cents of at least
    /// [`MINIMUM_CHARGE_CENTS`]. Metadata values are stringified.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidAmount` for any other amount.
    pub fn from_input(
        amount: Option<&serde_json::Value>,
        currency: Option<&str>,
        metadata: Option<&serde_json::Map<String, serde_json::Value>>,
    ) -> Result<Self, PaymentError> {
        let amount = amount
            .and_then(whole_cents)
            .filter(|cents| *cents >= MINIMUM_CHARGE_CENTS)
            .ok_or(PaymentError::InvalidAmount)?;

        let currency = currency
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map_or_else(|| CURRENCY.to_owned(), str::to_lowercase);

        let metadata = metadata
            .into_iter()
            .flatten()
            .map(|(key, value)| {
                let value = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect();

        Ok(Self {
            amount,
            currency,
            metadata,
        })
    }

    fn form_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("amount".to_owned(), self.amount.to_string()),
            ("currency".to_owned(), self.currency.clone()),
            (
                "automatic_payment_methods[enabled]".to_owned(),
                "true".to_owned(),
            ),
        ];
        params.extend(
            self.metadata
                .iter()
                .map(|(k, v)| (format!("metadata[{k}]"), v.clone())),
        );
        params
    }
}

/// A created payment intent.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

/// Payment processor API client.
#[derive(Clone)]
pub struct PaymentClient {
    client: reqwest::Client,
    api_base: String,
    secret_key: Option<SecretString>,
}

impl PaymentClient {
    /// Create a new payment client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &PaymentsConfig, timeout: Duration) -> Result<Self, PaymentError> {
        let mut headers = HeaderMap::new();
        headers.insert("Stripe-Version", HeaderValue::from_static("2024-06-20"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            secret_key: config.secret_key.clone(),
        })
    }

    /// Whether a secret key is configured.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.secret_key.is_some()
    }

    /// Create a payment intent.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::NotConfigured` without a secret key, or the
    /// processor's error otherwise.
    #[tracing::instrument(skip(self, request), fields(amount = request.amount))]
    pub async fn create_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, PaymentError> {
        let secret_key = self.secret_key.as_ref().ok_or(PaymentError::NotConfigured)?;

        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(secret_key.expose_secret())
            .form(&request.form_params())
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or(body);
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| PaymentError::Parse(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_amount_must_be_integer_cents_above_minimum() {
        for bad in [json!(49), json!(12.5), json!("5000"), json!(null), json!(-100)] {
            assert!(
                matches!(
                    PaymentIntentRequest::from_input(Some(&bad), None, None),
                    Err(PaymentError::InvalidAmount)
                ),
                "{bad} should be rejected"
            );
        }
        assert!(matches!(
            PaymentIntentRequest::from_input(None, None, None),
            Err(PaymentError::InvalidAmount)
        ));

        let ok = PaymentIntentRequest::from_input(Some(&json!(50)), None, None).unwrap();
        assert_eq!(ok.amount, 50);
        assert_eq!(ok.currency, "eur");
    }

    #[test]
    fn test_amount_accepts_whole_floats() {
        let req = PaymentIntentRequest::from_input(Some(&json!(5000.0)), None, None).unwrap();
        assert_eq!(req.amount, 5000);

        for bad in [json!(49.0), json!(5000.5), json!(1e300)] {
            assert!(
                matches!(
                    PaymentIntentRequest::from_input(Some(&bad), None, None),
                    Err(PaymentError::InvalidAmount)
                ),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_currency_is_lowercased() {
        let req = PaymentIntentRequest::from_input(Some(&json!(1000)), Some(" USD "), None).unwrap();
        assert_eq!(req.currency, "usd");
    }

    #[test]
    fn test_form_params_flatten_metadata() {
        let metadata = json!({"orderRef": "RAY-ABCD1234", "items": 3});
        let req = PaymentIntentRequest::from_input(
            Some(&json!(12_999)),
            None,
            metadata.as_object(),
        )
        .unwrap();

        let params = req.form_params();
        assert!(params.contains(&("amount".to_owned(), "12999".to_owned())));
        assert!(params.contains(&(
            "automatic_payment_methods[enabled]".to_owned(),
            "true".to_owned()
        )));
        assert!(params.contains(&("metadata[orderRef]".to_owned(), "RAY-ABCD1234".to_owned())));
        assert!(params.contains(&("metadata[items]".to_owned(), "3".to_owned())));
    }

    #[tokio::test]
    async fn test_unconfigured_client_refuses() {
        let config = PaymentsConfig {
            secret_key: None,
            api_base: "http://127.0.0.1:9".to_owned(),
        };
        let client = PaymentClient::new(&config, Duration::from_secs(1)).unwrap();
        assert!(!client.is_configured());

        let req = PaymentIntentRequest::from_input(Some(&json!(100)), None, None).unwrap();
        assert!(matches!(
            client.create_intent(&req).await,
            Err(PaymentError::NotConfigured)
        ));
    }
}
