//! Promo codes: creation rules and checkout eligibility.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{OrderStatus, ProductId, PromoCodeId, UserId};

/// A promo code as stored in the back-office.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoCode {
    pub id: PromoCodeId,
    /// Normalized code, see [`normalize_code`].
    pub code: String,
    /// Percentage off the subtotal, 1 to 100.
    pub discount: i32,
    pub active: bool,
    /// Minimum subtotal required. Zero means no minimum.
    pub min_amount: Decimal,
    /// Each account may redeem the code once.
    pub single_use: bool,
    pub free_shipping: bool,
    pub free_product_id: Option<ProductId>,
    pub free_product_label: Option<String>,
    pub usage_count: i32,
    pub created_at: DateTime<Utc>,
}

/// Canonical form of a code: surrounding whitespace removed, uppercased.
#[must_use]
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Reasons a new promo code is refused by the back-office.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PromoCodeError {
    #[error("Le code promo ne peut pas être vide")]
    EmptyCode,
    #[error("La réduction doit être comprise entre 1 et 100 % (reçu {0})")]
    DiscountOutOfRange(i32),
    #[error("Le montant minimum ne peut pas être négatif")]
    NegativeMinimum,
    #[error("Le code {0} existe déjà")]
    Duplicate(String),
}

/// Input for creating a promo code.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPromoCode {
    pub code: String,
    pub discount: i32,
    #[serde(default)]
    pub min_amount: Decimal,
    #[serde(default)]
    pub single_use: bool,
    #[serde(default)]
    pub free_shipping: bool,
    #[serde(default)]
    pub free_product_id: Option<ProductId>,
    #[serde(default)]
    pub free_product_label: Option<String>,
}

impl NewPromoCode {
    /// Normalize the code and check it against the existing codes.
    ///
    /// `existing` must yield already-normalized codes.
    ///
    /// # Errors
    ///
    /// Returns a [`PromoCodeError`] for an empty code, a discount outside
    /// 1..=100, a negative minimum, or a duplicate.
    pub fn validate<'a>(
        mut self,
        existing: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, PromoCodeError> {
        self.code = normalize_code(&self.code);
        if self.code.is_empty() {
            return Err(PromoCodeError::EmptyCode);
        }
        if !(1..=100).contains(&self.discount) {
            return Err(PromoCodeError::DiscountOutOfRange(self.discount));
        }
        if self.min_amount.is_sign_negative() && !self.min_amount.is_zero() {
            return Err(PromoCodeError::NegativeMinimum);
        }
        if existing.into_iter().any(|c| c == self.code) {
            return Err(PromoCodeError::Duplicate(self.code));
        }
        self.free_product_label = self
            .free_product_label
            .map(|l| l.trim().to_owned())
            .filter(|l| !l.is_empty());
        Ok(self)
    }
}

/// Why a code cannot be applied to a cart.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum PromoRejection {
    #[error("Code promo invalide")]
    NotFound,
    #[error("Ce code promo n'est plus actif")]
    Inactive,
    #[error("Ce code nécessite un panier d'au moins {minimum} €")]
    BelowMinimum { minimum: Decimal },
    #[error("Connectez-vous pour utiliser ce code à usage unique")]
    LoginRequired,
    #[error("Vous avez déjà utilisé ce code promo")]
    AlreadyUsed,
}

/// A past order of the shopper, reduced to what single-use checks need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorOrder {
    pub promo_code: Option<String>,
    pub status: OrderStatus,
}

/// Decide whether `promo` may be applied.
///
/// Checks run in a fixed order so the shopper sees the most relevant
/// message: activity, then minimum amount, then single-use constraints.
///
/// # Errors
///
/// Returns the first [`PromoRejection`] that applies.
pub fn check_eligibility(
    promo: &PromoCode,
    subtotal: Decimal,
    user: Option<UserId>,
    prior_orders: &[PriorOrder],
) -> Result<(), PromoRejection> {
    if !promo.active {
        return Err(PromoRejection::Inactive);
    }

    if promo.min_amount > Decimal::ZERO && subtotal < promo.min_amount {
        return Err(PromoRejection::BelowMinimum {
            minimum: promo.min_amount,
        });
    }

    if promo.single_use {
        if user.is_none() {
            return Err(PromoRejection::LoginRequired);
        }
        let already_used = prior_orders.iter().any(|order| {
            order.status.counts_as_redemption()
                && order
                    .promo_code
                    .as_deref()
                    .is_some_and(|code| normalize_code(code) == promo.code)
        });
        if already_used {
            return Err(PromoRejection::AlreadyUsed);
        }
    }

    Ok(())
}

/// The code a shopper has applied to their cart.
///
/// Stored in the session for guests and carried into the account on login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedPromo {
    pub code: String,
    pub discount: i32,
    #[serde(default)]
    pub free_shipping: bool,
    #[serde(default)]
    pub free_product_id: Option<ProductId>,
    #[serde(default)]
    pub free_product_label: Option<String>,
}

impl From<&PromoCode> for AppliedPromo {
    fn from(promo: &PromoCode) -> Self {
        Self {
            code: promo.code.clone(),
            discount: promo.discount,
            free_shipping: promo.free_shipping,
            free_product_id: promo.free_product_id,
            free_product_label: promo.free_product_label.clone(),
        }
    }
}

impl AppliedPromo {
    /// Reconcile a remembered code with the live promo table.
    ///
    /// A code that was deleted or deactivated is dropped. A code whose terms
    /// changed is refreshed.
    #[must_use]
    pub fn refresh(self, live: Option<&PromoCode>) -> Option<Self> {
        match live {
            Some(promo) if promo.active => Some(Self::from(promo)),
            _ => None,
        }
    }
}

/// Outcome of re-checking a remembered code before pricing a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revalidation {
    /// Still applies, with the live terms.
    Keep(AppliedPromo),
    /// Deleted or deactivated since it was applied.
    Gone,
    /// Still live, but no longer fits this cart or shopper.
    Rejected(PromoRejection),
}

/// Re-check a remembered code against the live promo table and the cart.
#[must_use]
pub fn revalidate(
    saved: AppliedPromo,
    live: Option<&PromoCode>,
    subtotal: Decimal,
    user: Option<UserId>,
    prior_orders: &[PriorOrder],
) -> Revalidation {
    let (Some(promo), Some(refreshed)) = (live, saved.refresh(live)) else {
        return Revalidation::Gone;
    };
    match check_eligibility(promo, subtotal, user, prior_orders) {
        Ok(()) => Revalidation::Keep(refreshed),
        Err(rejection) => Revalidation::Rejected(rejection),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_CODES: [&str; 0] = [];

    fn promo(min_amount: i64, single_use: bool) -> PromoCode {
        PromoCode {
            id: PromoCodeId::new(1),
            code: "BIENVENUE".to_owned(),
            discount: 10,
            active: true,
            min_amount: Decimal::from(min_amount),
            single_use,
            free_shipping: false,
            free_product_id: None,
            free_product_label: None,
            usage_count: 0,
            created_at: Utc::now(),
        }
    }

    fn new_code(code: &str, discount: i32) -> NewPromoCode {
        NewPromoCode {
            code: code.to_owned(),
            discount,
            min_amount: Decimal::ZERO,
            single_use: false,
            free_shipping: false,
            free_product_id: None,
            free_product_label: None,
        }
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("  ete25 "), "ETE25");
    }

    #[test]
    fn test_minimum_amount_fixture() {
        let code = promo(100, false);
        assert_eq!(
            check_eligibility(&code, Decimal::from(80), None, &[]),
            Err(PromoRejection::BelowMinimum {
                minimum: Decimal::from(100)
            })
        );
        assert_eq!(
            check_eligibility(&code, Decimal::from(150), None, &[]),
            Ok(())
        );
    }

    #[test]
    fn test_minimum_is_inclusive() {
        let code = promo(100, false);
        assert!(check_eligibility(&code, Decimal::from(100), None, &[]).is_ok());
    }

    #[test]
    fn test_inactive_code_rejected_first() {
        let mut code = promo(100, true);
        code.active = false;
        assert_eq!(
            check_eligibility(&code, Decimal::from(10), None, &[]),
            Err(PromoRejection::Inactive)
        );
    }

    #[test]
    fn test_single_use_requires_login() {
        let code = promo(0, true);
        assert_eq!(
            check_eligibility(&code, Decimal::from(50), None, &[]),
            Err(PromoRejection::LoginRequired)
        );
    }

    #[test]
    fn test_single_use_rejected_after_qualifying_order() {
        let code = promo(0, true);
        let user = Some(UserId::new(3));
        let shipped = PriorOrder {
            promo_code: Some("bienvenue".to_owned()),
            status: OrderStatus::Shipped,
        };

        assert_eq!(
            check_eligibility(&code, Decimal::from(50), user, &[shipped]),
            Err(PromoRejection::AlreadyUsed)
        );
    }

    #[test]
    fn test_single_use_ignores_pending_cancelled_and_other_codes() {
        let code = promo(0, true);
        let history = [
            PriorOrder {
                promo_code: Some("BIENVENUE".to_owned()),
                status: OrderStatus::Pending,
            },
            PriorOrder {
                promo_code: Some("BIENVENUE".to_owned()),
                status: OrderStatus::Cancelled,
            },
            PriorOrder {
                promo_code: Some("NOEL".to_owned()),
                status: OrderStatus::Delivered,
            },
            PriorOrder {
                promo_code: None,
                status: OrderStatus::Confirmed,
            },
        ];

        assert!(check_eligibility(&code, Decimal::from(50), Some(UserId::new(3)), &history).is_ok());
    }

    #[test]
    fn test_new_code_validation() {
        let ok = new_code(" noel ", 15).validate(["ETE25"]).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(ok.code, "NOEL");

        assert_eq!(
            new_code("   ", 15).validate(NO_CODES),
            Err(PromoCodeError::EmptyCode)
        );
        assert_eq!(
            new_code("X", 0).validate(NO_CODES),
            Err(PromoCodeError::DiscountOutOfRange(0))
        );
        assert_eq!(
            new_code("X", 101).validate(NO_CODES),
            Err(PromoCodeError::DiscountOutOfRange(101))
        );
        assert_eq!(
            new_code("ete25", 25).validate(["ETE25"]),
            Err(PromoCodeError::Duplicate("ETE25".to_owned()))
        );
    }

    #[test]
    fn test_negative_minimum_rejected() {
        let mut code = new_code("X", 10);
        code.min_amount = Decimal::new(-1, 0);
        assert_eq!(code.validate(NO_CODES), Err(PromoCodeError::NegativeMinimum));
    }

    #[test]
    fn test_applied_promo_refresh() {
        let mut live = promo(0, false);
        let applied = AppliedPromo::from(&live);

        live.discount = 20;
        assert_eq!(
            applied.clone().refresh(Some(&live)).map(|p| p.discount),
            Some(20)
        );

        live.active = false;
        assert_eq!(applied.clone().refresh(Some(&live)), None);
        assert_eq!(applied.refresh(None), None);
    }

    #[test]
    fn test_revalidate_keeps_live_terms() {
        let mut live = promo(50, false);
        let applied = AppliedPromo::from(&live);
        live.discount = 15;

        assert_eq!(
            revalidate(applied, Some(&live), Decimal::from(80), None, &[]),
            Revalidation::Keep(AppliedPromo::from(&live))
        );
    }

    #[test]
    fn test_revalidate_drops_deleted_and_inactive_codes() {
        let mut live = promo(0, false);
        let applied = AppliedPromo::from(&live);

        assert_eq!(
            revalidate(applied.clone(), None, Decimal::from(80), None, &[]),
            Revalidation::Gone
        );
        live.active = false;
        assert_eq!(
            revalidate(applied, Some(&live), Decimal::from(80), None, &[]),
            Revalidation::Gone
        );
    }

    #[test]
    fn test_revalidate_rejects_codes_that_no_longer_fit() {
        let minimum = promo(100, false);
        assert_eq!(
            revalidate(
                AppliedPromo::from(&minimum),
                Some(&minimum),
                Decimal::from(60),
                None,
                &[]
            ),
            Revalidation::Rejected(PromoRejection::BelowMinimum {
                minimum: Decimal::from(100)
            })
        );

        let single_use = promo(0, true);
        let delivered = PriorOrder {
            promo_code: Some("BIENVENUE".to_owned()),
            status: OrderStatus::Delivered,
        };
        assert_eq!(
            revalidate(
                AppliedPromo::from(&single_use),
                Some(&single_use),
                Decimal::from(60),
                Some(UserId::new(3)),
                &[delivered]
            ),
            Revalidation::Rejected(PromoRejection::AlreadyUsed)
        );
    }
}
