//! Shopping cart lines and arithmetic.
//!
//! The same [`Cart`] type backs both carts a shopper can have:
//!
//! - the guest cart, serialized into the session while nobody is signed in
//! - the account cart, rebuilt from `cart_items` rows on every request
//!
//! On login the guest cart is [merged](Cart::merge) into the account cart and
//! then discarded.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::ProductId;

/// One product in a cart.
///
/// Name, brand and price are a snapshot taken when the line was created. The
/// catalog pushes later edits through [`Cart::refresh_product`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub brand: String,
    pub unit_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub quantity: u32,
}

impl CartLine {
    /// Price of the line: unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Count and subtotal of a cart, as shown in the cart badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub item_count: u32,
    pub subtotal: Decimal,
}

/// An ordered collection of cart lines, at most one per product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Build a cart from lines, folding duplicate products together.
    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = CartLine>) -> Self {
        let mut cart = Self::default();
        for line in lines {
            cart.add(line);
        }
        cart
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn into_lines(self) -> Vec<CartLine> {
        self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The line for a product, if present.
    #[must_use]
    pub fn line(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    /// Quantity of a product currently in the cart (0 when absent).
    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId) -> u32 {
        self.line(product_id).map_or(0, |l| l.quantity)
    }

    /// Add a line to the cart.
    ///
    /// If the product is already present its quantity grows by the incoming
    /// quantity. Otherwise the line is appended. A zero quantity is treated
    /// as one. Returns the resulting quantity for that product.
    pub fn add(&mut self, mut line: CartLine) -> u32 {
        let quantity = line.quantity.max(1);
        if let Some(existing) = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == line.product_id)
        {
            existing.quantity = existing.quantity.saturating_add(quantity);
            return existing.quantity;
        }
        line.quantity = quantity;
        self.lines.push(line);
        quantity
    }

    /// Set the quantity of a product.
    ///
    /// A quantity of zero or less removes the line. Returns `false` when the
    /// product is not in the cart.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: i64) -> bool {
        if quantity <= 0 {
            return self.remove(product_id);
        }
        match self.lines.iter_mut().find(|l| l.product_id == product_id) {
            Some(line) => {
                line.quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
                true
            }
            None => false,
        }
    }

    /// Remove a product. Returns `true` if a line was removed.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        self.lines.len() != before
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0_u32, |acc, l| acc.saturating_add(l.quantity))
    }

    /// Sum of line totals, before discounts and shipping.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    #[must_use]
    pub fn summary(&self) -> CartSummary {
        CartSummary {
            item_count: self.item_count(),
            subtotal: self.subtotal(),
        }
    }

    /// Fold another cart into this one, summing quantities per product.
    ///
    /// Lines that exist only in `other` keep their snapshot and are appended
    /// in their original order.
    pub fn merge(&mut self, other: Self) {
        for line in other.lines {
            self.add(line);
        }
    }

    /// Drop lines whose product no longer exists in the catalog.
    ///
    /// Returns the removed product ids.
    pub fn retain_products(&mut self, valid: &HashSet<ProductId>) -> Vec<ProductId> {
        let mut removed = Vec::new();
        self.lines.retain(|l| {
            let keep = valid.contains(&l.product_id);
            if !keep {
                removed.push(l.product_id);
            }
            keep
        });
        removed
    }

    /// Apply a catalog edit to any line holding the product.
    ///
    /// Returns `true` if a line changed.
    pub fn refresh_product(&mut self, product_id: ProductId, name: &str, price: Decimal) -> bool {
        let mut changed = false;
        for line in self.lines.iter_mut().filter(|l| l.product_id == product_id) {
            if line.name != name || line.unit_price != price {
                name.clone_into(&mut line.name);
                line.unit_price = price;
                changed = true;
            }
        }
        changed
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn line(id: i32, price_cents: i64, quantity: u32) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            name: format!("Parfum {id}"),
            brand: "Rayha".to_owned(),
            unit_price: Decimal::new(price_cents, 2),
            image_url: None,
            scent: Some("Boisé".to_owned()),
            category: Some("Eau de parfum".to_owned()),
            quantity,
        }
    }

    #[test]
    fn test_adding_same_product_twice_increments_quantity() {
        let mut cart = Cart::default();
        cart.add(line(1, 5000, 1));
        let quantity = cart.add(line(1, 5000, 1));

        assert_eq!(quantity, 2);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.item_count(), 2);
    }

    #[test]
    fn test_zero_quantity_add_counts_as_one() {
        let mut cart = Cart::default();
        cart.add(line(1, 5000, 0));
        assert_eq!(cart.quantity_of(ProductId::new(1)), 1);
    }

    #[test]
    fn test_set_quantity_zero_or_negative_removes_line() {
        let mut cart = Cart::from_lines([line(1, 5000, 2), line(2, 3000, 1)]);

        assert!(cart.set_quantity(ProductId::new(1), 0));
        assert!(cart.line(ProductId::new(1)).is_none());

        assert!(cart.set_quantity(ProductId::new(2), -3));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_on_missing_product() {
        let mut cart = Cart::from_lines([line(1, 5000, 2)]);
        assert!(!cart.set_quantity(ProductId::new(9), 4));
        assert_eq!(cart.item_count(), 2);
    }

    #[test]
    fn test_totals() {
        let cart = Cart::from_lines([line(1, 4550, 2), line(2, 1999, 1)]);
        let summary = cart.summary();
        assert_eq!(summary.item_count, 3);
        assert_eq!(summary.subtotal, Decimal::new(10_899, 2));
    }

    #[test]
    fn test_merge_sums_quantities_per_product() {
        let mut account = Cart::from_lines([line(1, 5000, 1), line(2, 3000, 2)]);
        let guest = Cart::from_lines([line(2, 3000, 3), line(3, 2000, 1)]);

        account.merge(guest);

        assert_eq!(account.quantity_of(ProductId::new(1)), 1);
        assert_eq!(account.quantity_of(ProductId::new(2)), 5);
        assert_eq!(account.quantity_of(ProductId::new(3)), 1);
        assert_eq!(account.lines().len(), 3);
    }

    #[test]
    fn test_retain_products_drops_orphans() {
        let mut cart = Cart::from_lines([line(1, 5000, 1), line(2, 3000, 1)]);
        let valid: HashSet<_> = [ProductId::new(2)].into_iter().collect();

        let removed = cart.retain_products(&valid);

        assert_eq!(removed, vec![ProductId::new(1)]);
        assert_eq!(cart.lines().len(), 1);
    }

    #[test]
    fn test_refresh_product_propagates_catalog_edit() {
        let mut cart = Cart::from_lines([line(1, 5000, 2)]);

        assert!(cart.refresh_product(ProductId::new(1), "Oud Royal", Decimal::new(6500, 2)));
        assert!(!cart.refresh_product(ProductId::new(1), "Oud Royal", Decimal::new(6500, 2)));

        let refreshed = cart.line(ProductId::new(1));
        assert_eq!(refreshed.map(|l| l.name.as_str()), Some("Oud Royal"));
        assert_eq!(cart.subtotal(), Decimal::new(13_000, 2));
    }

    #[test]
    fn test_session_json_shape() {
        let cart = Cart::from_lines([line(7, 1250, 1)]);
        let json = serde_json::to_value(&cart).unwrap_or_default();
        assert_eq!(json[0]["productId"], 7);
        assert_eq!(json[0]["unitPrice"], "12.50");

        let back: Cart = serde_json::from_value(json).unwrap_or_default();
        assert_eq!(back, cart);
    }
}
