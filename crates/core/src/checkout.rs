//! Order pricing.
//!
//! Turns a cart and an optional applied promo into the amounts the shopper
//! pays. The same quote is used to create the payment intent and to write the
//! order, so both always agree.

use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::{Cart, CartLine};
use crate::promo::AppliedPromo;
use crate::types::money::round_cents;

/// Subtotal from which shipping is free.
pub const FREE_SHIPPING_THRESHOLD: Decimal = Decimal::from_parts(100, 0, 0, false, 0);

/// Flat shipping fee below the threshold (9.99).
pub const SHIPPING_COST: Decimal = Decimal::from_parts(999, 0, 0, false, 2);

/// Prefix of human-facing order references.
pub const REFERENCE_PREFIX: &str = "RAY-";

const REFERENCE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const REFERENCE_LENGTH: usize = 8;

/// The gift a promo code adds to the order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeProduct<'a> {
    /// Catalog line of the gifted product. Its price is ignored.
    pub line: CartLine,
    /// Label from the promo, e.g. "Offert".
    pub label: &'a str,
}

/// Priced order, ready to be charged and persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderQuote {
    pub lines: Vec<CartLine>,
    pub subtotal: Decimal,
    pub discount_percent: i32,
    pub discount_amount: Decimal,
    pub shipping_cost: Decimal,
    pub total: Decimal,
    pub promo_code: Option<String>,
}

impl OrderQuote {
    /// Whether shipping is waived for this order.
    #[must_use]
    pub fn ships_free(&self) -> bool {
        self.shipping_cost.is_zero()
    }
}

/// Price a cart.
///
/// - shipping is free when the subtotal reaches [`FREE_SHIPPING_THRESHOLD`]
///   or the promo grants free shipping, otherwise [`SHIPPING_COST`]
/// - the discount is a percentage of the subtotal, and the discounted
///   subtotal never goes below zero
/// - a promo gift is appended as a zero-priced line named `"{label} : {name}"`
#[must_use]
pub fn price_order(
    cart: &Cart,
    promo: Option<&AppliedPromo>,
    free_product: Option<FreeProduct<'_>>,
) -> OrderQuote {
    let subtotal = cart.subtotal();
    let discount_percent = promo.map_or(0, |p| p.discount.clamp(0, 100));
    let discount_amount = round_cents(subtotal * Decimal::from(discount_percent) / Decimal::ONE_HUNDRED);

    let free_shipping_promo = promo.is_some_and(|p| p.free_shipping);
    let shipping_cost = if subtotal >= FREE_SHIPPING_THRESHOLD || free_shipping_promo {
        Decimal::ZERO
    } else {
        SHIPPING_COST
    };

    let total = (subtotal - discount_amount).max(Decimal::ZERO) + shipping_cost;

    let mut lines = cart.lines().to_vec();
    if let Some(gift) = free_product {
        lines.push(CartLine {
            name: format!("{} : {}", gift.label, gift.line.name),
            unit_price: Decimal::ZERO,
            quantity: 1,
            ..gift.line
        });
    }

    OrderQuote {
        lines,
        subtotal,
        discount_percent,
        discount_amount,
        shipping_cost,
        total,
        promo_code: promo.map(|p| p.code.clone()),
    }
}

/// Generate a human-facing order reference such as `RAY-7KQ2M9XA`.
///
/// Ambiguous characters (0, O, 1, I) are excluded so references can be read
/// over the phone.
#[must_use]
pub fn generate_reference() -> String {
    let mut rng = rand::rng();
    let mut reference = String::with_capacity(REFERENCE_PREFIX.len() + REFERENCE_LENGTH);
    reference.push_str(REFERENCE_PREFIX);
    for _ in 0..REFERENCE_LENGTH {
        let idx = rng.random_range(0..REFERENCE_ALPHABET.len());
        if let Some(&c) = REFERENCE_ALPHABET.get(idx) {
            reference.push(char::from(c));
        }
    }
    reference
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::tests::line;

    fn applied(discount: i32, free_shipping: bool) -> AppliedPromo {
        AppliedPromo {
            code: "ETE25".to_owned(),
            discount,
            free_shipping,
            free_product_id: None,
            free_product_label: None,
        }
    }

    #[test]
    fn test_constants() {
        assert_eq!(FREE_SHIPPING_THRESHOLD, Decimal::from(100));
        assert_eq!(SHIPPING_COST, Decimal::new(999, 2));
    }

    #[test]
    fn test_shipping_charged_below_threshold() {
        let cart = Cart::from_lines([line(1, 4000, 2)]);
        let quote = price_order(&cart, None, None);

        assert_eq!(quote.subtotal, Decimal::from(80));
        assert_eq!(quote.shipping_cost, SHIPPING_COST);
        assert_eq!(quote.total, Decimal::new(8999, 2));
    }

    #[test]
    fn test_shipping_free_at_threshold() {
        let cart = Cart::from_lines([line(1, 5000, 2)]);
        let quote = price_order(&cart, None, None);

        assert!(quote.ships_free());
        assert_eq!(quote.total, Decimal::from(100));
    }

    #[test]
    fn test_threshold_uses_subtotal_before_discount() {
        let cart = Cart::from_lines([line(1, 12_000, 1)]);
        let quote = price_order(&cart, Some(&applied(25, false)), None);

        assert_eq!(quote.discount_amount, Decimal::from(30));
        assert!(quote.ships_free());
        assert_eq!(quote.total, Decimal::from(90));
        assert_eq!(quote.promo_code.as_deref(), Some("ETE25"));
    }

    #[test]
    fn test_promo_free_shipping() {
        let cart = Cart::from_lines([line(1, 2000, 1)]);
        let quote = price_order(&cart, Some(&applied(10, true)), None);

        assert_eq!(quote.shipping_cost, Decimal::ZERO);
        assert_eq!(quote.total, Decimal::from(18));
    }

    #[test]
    fn test_full_discount_never_negative() {
        let cart = Cart::from_lines([line(1, 2000, 1)]);
        let quote = price_order(&cart, Some(&applied(100, false)), None);

        assert_eq!(quote.discount_amount, Decimal::from(20));
        assert_eq!(quote.total, SHIPPING_COST);
    }

    #[test]
    fn test_discount_rounded_to_cents() {
        let cart = Cart::from_lines([line(1, 3333, 1)]);
        let quote = price_order(&cart, Some(&applied(15, false)), None);
        // 33.33 * 15% = 4.9995
        assert_eq!(quote.discount_amount, Decimal::new(500, 2));
    }

    #[test]
    fn test_free_product_added_at_zero() {
        let cart = Cart::from_lines([line(1, 5000, 1)]);
        let gift = FreeProduct {
            line: line(9, 2500, 4),
            label: "Offert",
        };
        let quote = price_order(&cart, Some(&applied(0, false)), Some(gift));

        assert_eq!(quote.lines.len(), 2);
        let extra = quote.lines.last();
        assert_eq!(extra.map(|l| l.name.as_str()), Some("Offert : Parfum 9"));
        assert_eq!(extra.map(|l| l.unit_price), Some(Decimal::ZERO));
        assert_eq!(extra.map(|l| l.quantity), Some(1));
        assert_eq!(quote.subtotal, Decimal::from(50));
    }

    #[test]
    fn test_reference_format() {
        let reference = generate_reference();
        assert!(reference.starts_with(REFERENCE_PREFIX));
        assert_eq!(reference.len(), REFERENCE_PREFIX.len() + REFERENCE_LENGTH);
        assert!(
            reference[REFERENCE_PREFIX.len()..]
                .bytes()
                .all(|b| REFERENCE_ALPHABET.contains(&b))
        );
    }
}
