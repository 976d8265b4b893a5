//! Back-office access commands.
//!
//! Accounts are created through the storefront's registration endpoint.
//! These commands only change the role of an existing account.

use thiserror::Error;

use rayha_core::{Email, UserRole};
use rayha_storefront::db::{RepositoryError, UserRepository};

use super::{CommandError, connect};

/// Errors that can occur during role changes.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// No account with that email.
    #[error("No account with email: {0}")]
    UnknownAccount(String),

    #[error("Database error: {0}")]
    Repository(RepositoryError),
}

async fn set_role(email: &str, role: UserRole) -> Result<(), AdminError> {
    let parsed = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;
    let pool = connect().await?;

    let user = UserRepository::new(&pool)
        .set_role(&parsed, role)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AdminError::UnknownAccount(email.to_owned()),
            other => AdminError::Repository(other),
        })?;

    tracing::info!(user_id = %user.id, email = %user.email, role = %user.role, "Role updated");
    Ok(())
}

/// Grant the admin role.
pub async fn promote(email: &str) -> Result<(), AdminError> {
    set_role(email, UserRole::Admin).await
}

/// Revert to a shopper account.
pub async fn demote(email: &str) -> Result<(), AdminError> {
    set_role(email, UserRole::Customer).await
}
