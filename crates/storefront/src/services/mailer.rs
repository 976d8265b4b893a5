//! Transactional email client (Resend-compatible REST API).

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::EmailConfig;

const WELCOME_SUBJECT: &str = "Bienvenue chez Rayha Store";

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum MailerError {
    /// No API key configured.
    #[error("email provider is not configured")]
    NotConfigured,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider refused the message. `body` is its raw response.
    #[error("API error: {status} - {body}")]
    Api { status: u16, body: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: String,
}

#[derive(Deserialize)]
struct SendEmailResponse {
    id: String,
}

/// Email provider API client.
#[derive(Clone)]
pub struct Mailer {
    client: reqwest::Client,
    api_base: String,
    api_key: Option<SecretString>,
    from: String,
    storefront_url: String,
}

impl Mailer {
    /// Create a new mailer.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(
        config: &EmailConfig,
        storefront_url: &str,
        timeout: Duration,
    ) -> Result<Self, MailerError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            from: config.from.clone(),
            storefront_url: storefront_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Send the welcome email. Returns the provider's message ID.
    ///
    /// # Errors
    ///
    /// Returns `MailerError::NotConfigured` without an API key, or
    /// `MailerError::Api` carrying the provider's status and body.
    #[tracing::instrument(skip(self))]
    pub async fn send_welcome(&self, to: &str) -> Result<String, MailerError> {
        self.send(to, WELCOME_SUBJECT, welcome_html(&self.storefront_url))
            .await
    }

    async fn send(&self, to: &str, subject: &str, html: String) -> Result<String, MailerError> {
        let api_key = self.api_key.as_ref().ok_or(MailerError::NotConfigured)?;

        let response = self
            .client
            .post(format!("{}/emails", self.api_base))
            .bearer_auth(api_key.expose_secret())
            .json(&SendEmailRequest {
                from: &self.from,
                to: [to],
                subject,
                html,
            })
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailerError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let sent: SendEmailResponse = response
            .json()
            .await
            .map_err(|e| MailerError::Parse(e.to_string()))?;
        Ok(sent.id)
    }
}

fn welcome_html(storefront_url: &str) -> String {
    format!(
        r#"<div style="font-family: Georgia, serif; max-width: 560px; margin: 0 auto; color: #2b2118;">
  <h1 style="font-weight: normal; letter-spacing: 0.08em;">Bienvenue chez Rayha Store</h1>
  <p>Merci de nous avoir rejoints. Votre compte est prêt : retrouvez vos favoris,
  suivez vos commandes et découvrez nos duos de layering.</p>
  <p><a href="{storefront_url}" style="color: #8a6a3f;">Découvrir la collection</a></p>
  <p style="font-size: 12px; color: #8c7b6b;">Livraison offerte dès 100 € d'achat.</p>
</div>"#
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_links_to_storefront() {
        let html = welcome_html("https://rayhastore.com");
        assert!(html.contains(r#"href="https://rayhastore.com""#));
        assert!(html.contains("Bienvenue"));
    }

    #[test]
    fn test_request_shape() {
        let body = serde_json::to_value(SendEmailRequest {
            from: "Rayha <a@b.fr>",
            to: ["client@example.com"],
            subject: WELCOME_SUBJECT,
            html: "<p>x</p>".to_owned(),
        })
        .unwrap();
        assert_eq!(body["to"], serde_json::json!(["client@example.com"]));
        assert_eq!(body["subject"], WELCOME_SUBJECT);
    }

    #[tokio::test]
    async fn test_unconfigured_mailer_refuses() {
        let config = EmailConfig {
            api_key: None,
            api_base: "http://127.0.0.1:9".to_owned(),
            from: "Rayha <a@b.fr>".to_owned(),
        };
        let mailer = Mailer::new(&config, "http://localhost", Duration::from_secs(1)).unwrap();
        assert!(matches!(
            mailer.send_welcome("client@example.com").await,
            Err(MailerError::NotConfigured)
        ));
    }
}
