//! Session-related types.
//!
//! Types stored in the session for authentication state and guest data.

use serde::{Deserialize, Serialize};

use rayha_core::{Email, UserId, UserRole};

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Display name chosen at registration.
    pub username: Option<String>,
    /// Role at login time.
    pub role: UserRole,
}

impl CurrentUser {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Name to greet the user with: the username, else the email's local part.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.email.local_part())
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the cart of a visitor who is not signed in.
    pub const GUEST_CART: &str = "guest_cart";

    /// Key for the promo code applied in this browser session.
    pub const GUEST_PROMO: &str = "guest_promo";

    /// Key for the anonymous analytics session identifier.
    pub const ANALYTICS_SESSION: &str = "analytics_session";
}
