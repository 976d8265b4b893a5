//! Enumerations stored as `PostgreSQL` enum types in the `rayha` schema.

use serde::{Deserialize, Serialize};

/// Lifecycle of an order.
///
/// Orders are created `Pending` at checkout. Every transition stamps the
/// matching `*_at` column so the back-office can show a timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "rayha.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Confirmed,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether an order in this status counts as a redemption of its promo code.
    ///
    /// Single-use codes are only "spent" by orders that went through; a pending
    /// or cancelled order does not burn the code.
    #[must_use]
    pub const fn counts_as_redemption(self) -> bool {
        matches!(self, Self::Confirmed | Self::Shipped | Self::Delivered)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "rayha.user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Shopper account.
    #[default]
    Customer,
    /// Back-office access to catalog, orders, promo codes and CRM.
    Admin,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

/// Who a fragrance is marketed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "rayha.gender", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Homme,
    Femme,
    #[default]
    Mixte,
}

/// Level of the olfactory pyramid a note belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "rayha.pyramid", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Pyramid {
    /// Top notes, the first impression.
    Tete,
    /// Heart notes.
    Coeur,
    /// Base notes, the longest lasting.
    Fond,
}

impl Pyramid {
    /// Weight of a note at this level when scoring olfactory families.
    #[must_use]
    pub const fn weight(self) -> u32 {
        match self {
            Self::Tete => 1,
            Self::Coeur => 2,
            Self::Fond => 3,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_parse_and_display() {
        for status in OrderStatus::ALL {
            assert_eq!(status.to_string().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("completed".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_redemption_statuses() {
        assert!(!OrderStatus::Pending.counts_as_redemption());
        assert!(OrderStatus::Confirmed.counts_as_redemption());
        assert!(OrderStatus::Shipped.counts_as_redemption());
        assert!(OrderStatus::Delivered.counts_as_redemption());
        assert!(!OrderStatus::Cancelled.counts_as_redemption());
    }

    #[test]
    fn test_role_roundtrip() {
        assert_eq!("admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!(UserRole::Customer.to_string(), "customer");
        assert!("super_admin".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_pyramid_serde_names() {
        assert_eq!(serde_json::to_string(&Pyramid::Coeur).unwrap(), "\"coeur\"");
        assert_eq!(Pyramid::Fond.weight(), 3);
    }
}
