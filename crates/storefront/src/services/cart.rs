//! Cart service.
//!
//! A shopper has exactly one cart. Signed-in shoppers keep it in
//! `cart_items`; guests keep it in their session under
//! [`session_keys::GUEST_CART`]. Both go through the same [`Cart`] type, and
//! the guest cart is folded into the account cart on login.
//!
//! The applied promo code lives in the session under
//! [`session_keys::GUEST_PROMO`] for every shopper and is re-validated each
//! time the cart is priced.

use std::collections::HashSet;

use serde::Serialize;
use sqlx::PgPool;
use tower_sessions::Session;
use tracing::instrument;

use rayha_core::cart::{Cart, CartLine, CartSummary};
use rayha_core::catalog::Product;
use rayha_core::checkout::{FreeProduct, OrderQuote, price_order};
use rayha_core::inventory::can_add_to_cart;
use rayha_core::promo::{
    AppliedPromo, PriorOrder, PromoRejection, Revalidation, check_eligibility, normalize_code,
    revalidate,
};
use rayha_core::{ProductId, UserId};

use crate::db::{
    AnalyticsRepository, CartRepository, OrderRepository, ProductRepository, PromoCodeRepository,
};
use crate::error::{AppError, Result};
use crate::models::{CurrentUser, session_keys};

/// Label of a promo gift line when the code does not set one.
pub const DEFAULT_GIFT_LABEL: &str = "Offert";

/// Who a cart belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartOwner {
    Guest,
    Account(UserId),
}

impl CartOwner {
    #[must_use]
    pub fn of(user: Option<&CurrentUser>) -> Self {
        user.map_or(Self::Guest, |u| Self::Account(u.id))
    }

    #[must_use]
    pub const fn user_id(self) -> Option<UserId> {
        match self {
            Self::Guest => None,
            Self::Account(id) => Some(id),
        }
    }
}

/// Everything the cart page shows.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub summary: CartSummary,
    pub promo: Option<AppliedPromo>,
    pub quote: OrderQuote,
}

/// Build the gift line a promo adds, if any.
#[must_use]
pub fn gift_line<'a>(promo: &'a AppliedPromo, product: &Product) -> FreeProduct<'a> {
    FreeProduct {
        line: product.to_cart_line(1),
        label: promo
            .free_product_label
            .as_deref()
            .unwrap_or(DEFAULT_GIFT_LABEL),
    }
}

/// Stock guard shared by add and update.
fn ensure_stock(product: &Product, in_cart: u32, quantity: u32) -> Result<()> {
    if can_add_to_cart(product.stock, in_cart, quantity) {
        return Ok(());
    }
    let message = if product.in_stock() {
        format!(
            "Stock insuffisant pour {} ({} disponible(s))",
            product.name, product.stock
        )
    } else {
        format!("{} est en rupture de stock", product.name)
    };
    Err(AppError::Conflict(message))
}

/// Cart operations for the current shopper.
pub struct CartService<'a> {
    pool: &'a PgPool,
    session: &'a Session,
    owner: CartOwner,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, session: &'a Session, owner: CartOwner) -> Self {
        Self {
            pool,
            session,
            owner,
        }
    }

    /// Load the cart.
    ///
    /// Guest lines are reconciled with the catalog: lines for deleted
    /// products are dropped and names and prices are refreshed.
    ///
    /// # Errors
    ///
    /// Returns `AppError` if the database or session store fails.
    pub async fn load(&self) -> Result<Cart> {
        match self.owner {
            CartOwner::Account(user_id) => Ok(CartRepository::new(self.pool).get(user_id).await?),
            CartOwner::Guest => {
                let mut cart = self.guest_cart().await?;
                if cart.is_empty() {
                    return Ok(cart);
                }

                let ids: Vec<ProductId> = cart.lines().iter().map(|l| l.product_id).collect();
                let products = ProductRepository::new(self.pool).get_many(&ids).await?;
                let valid: HashSet<ProductId> = products.iter().map(|p| p.id).collect();

                let mut changed = !cart.retain_products(&valid).is_empty();
                for product in &products {
                    changed |= cart.refresh_product(product.id, &product.name, product.price);
                }
                if changed {
                    self.save_guest_cart(&cart).await?;
                }
                Ok(cart)
            }
        }
    }

    /// Add `quantity` units of a product.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown product and
    /// `AppError::Conflict` when stock cannot cover the new quantity.
    #[instrument(skip(self))]
    pub async fn add(&self, product_id: ProductId, quantity: u32) -> Result<Cart> {
        let quantity = quantity.max(1);
        let product = self.product(product_id).await?;
        let mut cart = self.load().await?;
        ensure_stock(&product, cart.quantity_of(product_id), quantity)?;

        let line = product.to_cart_line(quantity);
        match self.owner {
            CartOwner::Account(user_id) => {
                CartRepository::new(self.pool).add(user_id, &line).await?;
                cart.add(line);
            }
            CartOwner::Guest => {
                cart.add(line);
                self.save_guest_cart(&cart).await?;
            }
        }

        if let Err(e) = AnalyticsRepository::new(self.pool)
            .record_add_to_cart(product_id)
            .await
        {
            tracing::warn!(error = %e, "Failed to record add-to-cart event");
        }

        Ok(cart)
    }

    /// Set a line's quantity; zero or less removes the line.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` when the product is not in the cart and
    /// `AppError::Conflict` when stock cannot cover the quantity.
    #[instrument(skip(self))]
    pub async fn set_quantity(&self, product_id: ProductId, quantity: i64) -> Result<Cart> {
        let mut cart = self.load().await?;
        if cart.line(product_id).is_none() {
            return Err(AppError::NotFound(
                "Cet article n'est pas dans votre panier".to_owned(),
            ));
        }

        if quantity > 0 {
            let product = self.product(product_id).await?;
            ensure_stock(&product, 0, u32::try_from(quantity).unwrap_or(u32::MAX))?;
        }

        cart.set_quantity(product_id, quantity);
        match self.owner {
            CartOwner::Account(user_id) => {
                CartRepository::new(self.pool)
                    .set_quantity(user_id, product_id, quantity)
                    .await?;
            }
            CartOwner::Guest => self.save_guest_cart(&cart).await?,
        }
        Ok(cart)
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `AppError` if the database or session store fails.
    pub async fn remove(&self, product_id: ProductId) -> Result<Cart> {
        match self.owner {
            CartOwner::Account(user_id) => {
                let repo = CartRepository::new(self.pool);
                repo.remove(user_id, product_id).await?;
                Ok(repo.get(user_id).await?)
            }
            CartOwner::Guest => {
                let mut cart = self.guest_cart().await?;
                if cart.remove(product_id) {
                    self.save_guest_cart(&cart).await?;
                }
                Ok(cart)
            }
        }
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `AppError` if the database or session store fails.
    pub async fn clear(&self) -> Result<()> {
        match self.owner {
            CartOwner::Account(user_id) => CartRepository::new(self.pool).clear(user_id).await?,
            CartOwner::Guest => {
                self.session.remove::<Cart>(session_keys::GUEST_CART).await?;
            }
        }
        Ok(())
    }

    /// Apply a promo code to the cart.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Promo` with the reason the code was refused.
    #[instrument(skip(self))]
    pub async fn apply_promo(&self, code: &str) -> Result<AppliedPromo> {
        let code = normalize_code(code);
        if code.is_empty() {
            return Err(PromoRejection::NotFound.into());
        }

        let promo = PromoCodeRepository::new(self.pool)
            .get_by_code(&code)
            .await?
            .ok_or(PromoRejection::NotFound)?;

        let cart = self.load().await?;
        let prior = self.prior_orders().await?;
        check_eligibility(&promo, cart.subtotal(), self.owner.user_id(), &prior)?;

        let applied = AppliedPromo::from(&promo);
        self.session
            .insert(session_keys::GUEST_PROMO, &applied)
            .await?;
        Ok(applied)
    }

    /// Remove the applied promo code.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Session` if the session store fails.
    pub async fn remove_promo(&self) -> Result<()> {
        self.session
            .remove::<AppliedPromo>(session_keys::GUEST_PROMO)
            .await?;
        Ok(())
    }

    /// The applied promo, re-checked against the live code.
    ///
    /// A code that was deleted, deactivated, or no longer fits the cart is
    /// dropped from the session. Changed terms are picked up.
    ///
    /// # Errors
    ///
    /// Returns `AppError` if the database or session store fails.
    pub async fn applied_promo(&self, cart: &Cart) -> Result<Option<AppliedPromo>> {
        let Some(saved) = self
            .session
            .get::<AppliedPromo>(session_keys::GUEST_PROMO)
            .await?
        else {
            return Ok(None);
        };

        let live = PromoCodeRepository::new(self.pool)
            .get_by_code(&saved.code)
            .await?;
        let prior = self.prior_orders().await?;
        let outcome = revalidate(
            saved.clone(),
            live.as_ref(),
            cart.subtotal(),
            self.owner.user_id(),
            &prior,
        );
        settle_promo(self.session, &saved, outcome, PromoStage::Browsing).await
    }

    /// The cart with its summary, promo and priced quote.
    ///
    /// # Errors
    ///
    /// Returns `AppError` if the database or session store fails.
    pub async fn view(&self) -> Result<CartView> {
        let cart = self.load().await?;
        let promo = self.applied_promo(&cart).await?;
        let gift = self.gift_product(promo.as_ref()).await?;

        let quote = price_order(
            &cart,
            promo.as_ref(),
            promo
                .as_ref()
                .zip(gift.as_ref())
                .map(|(p, product)| gift_line(p, product)),
        );

        Ok(CartView {
            summary: cart.summary(),
            items: cart.into_lines(),
            promo,
            quote,
        })
    }

    /// The gifted product of a promo, when it exists and is in stock.
    async fn gift_product(&self, promo: Option<&AppliedPromo>) -> Result<Option<Product>> {
        let Some(product_id) = promo.and_then(|p| p.free_product_id) else {
            return Ok(None);
        };
        let product = ProductRepository::new(self.pool).get(product_id).await?;
        Ok(product.filter(Product::in_stock))
    }

    async fn product(&self, product_id: ProductId) -> Result<Product> {
        ProductRepository::new(self.pool)
            .get(product_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Produit introuvable".to_owned()))
    }

    async fn prior_orders(&self) -> Result<Vec<PriorOrder>> {
        match self.owner.user_id() {
            Some(user_id) => Ok(OrderRepository::new(self.pool)
                .prior_orders(user_id)
                .await?),
            None => Ok(Vec::new()),
        }
    }

    async fn guest_cart(&self) -> Result<Cart> {
        Ok(self
            .session
            .get::<Cart>(session_keys::GUEST_CART)
            .await?
            .unwrap_or_default())
    }

    async fn save_guest_cart(&self, cart: &Cart) -> Result<()> {
        if cart.is_empty() {
            self.session.remove::<Cart>(session_keys::GUEST_CART).await?;
        } else {
            self.session.insert(session_keys::GUEST_CART, cart).await?;
        }
        Ok(())
    }
}

/// Where a remembered promo is being re-checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromoStage {
    /// Viewing or quoting the cart: a code that stopped fitting is dropped.
    Browsing,
    /// Placing the order: a code that stopped fitting fails the checkout.
    Checkout,
}

/// Store the outcome of a promo re-check in the session.
///
/// Returns the promo to price with. Codes that are gone or rejected are
/// removed from the session, and changed terms are saved.
///
/// # Errors
///
/// Returns `AppError::Promo` for a rejected code at checkout, or
/// `AppError::Session` if the session store fails.
pub async fn settle_promo(
    session: &Session,
    saved: &AppliedPromo,
    outcome: Revalidation,
    stage: PromoStage,
) -> Result<Option<AppliedPromo>> {
    match outcome {
        Revalidation::Keep(promo) => {
            if promo != *saved {
                session.insert(session_keys::GUEST_PROMO, &promo).await?;
            }
            Ok(Some(promo))
        }
        Revalidation::Gone => {
            tracing::debug!(code = %saved.code, "Dropping promo code that no longer exists");
            session
                .remove::<AppliedPromo>(session_keys::GUEST_PROMO)
                .await?;
            Ok(None)
        }
        Revalidation::Rejected(rejection) => {
            tracing::debug!(code = %saved.code, %rejection, "Promo code no longer fits the cart");
            session
                .remove::<AppliedPromo>(session_keys::GUEST_PROMO)
                .await?;
            match stage {
                PromoStage::Browsing => Ok(None),
                PromoStage::Checkout => Err(rejection.into()),
            }
        }
    }
}

/// Fold the session's guest cart into an account after login.
///
/// Quantities are summed per product. The guest cart is only removed from the
/// session once the merge has been stored.
///
/// # Errors
///
/// Returns `AppError` if the database or session store fails.
#[instrument(skip(pool, session))]
pub async fn merge_guest_cart(pool: &PgPool, session: &Session, user_id: UserId) -> Result<()> {
    let Some(guest) = session.get::<Cart>(session_keys::GUEST_CART).await? else {
        return Ok(());
    };

    if !guest.is_empty() {
        CartRepository::new(pool).merge(user_id, guest.lines()).await?;
        tracing::info!(lines = guest.lines().len(), "Merged guest cart into account");
    }
    session.remove::<Cart>(session_keys::GUEST_CART).await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;
    use tower_sessions::MemoryStore;

    use super::*;
    use crate::test_fixtures::product;

    async fn session_with(applied: &AppliedPromo) -> Session {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        session
            .insert(session_keys::GUEST_PROMO, applied)
            .await
            .unwrap();
        session
    }

    async fn stored_promo(session: &Session) -> Option<AppliedPromo> {
        session
            .get::<AppliedPromo>(session_keys::GUEST_PROMO)
            .await
            .unwrap()
    }

    fn promo(label: Option<&str>) -> AppliedPromo {
        AppliedPromo {
            code: "BIENVENUE".to_owned(),
            discount: 10,
            free_shipping: false,
            free_product_id: Some(ProductId::new(2)),
            free_product_label: label.map(str::to_owned),
        }
    }

    #[test]
    fn test_gift_line_uses_default_label() {
        let p = promo(None);
        let gift = gift_line(&p, &product(2, "Miniature Oud"));
        assert_eq!(gift.label, "Offert");
        assert_eq!(gift.line.quantity, 1);
        assert_eq!(gift.line.product_id, ProductId::new(2));
    }

    #[test]
    fn test_gift_line_uses_promo_label() {
        let p = promo(Some("Cadeau"));
        assert_eq!(gift_line(&p, &product(2, "Miniature")).label, "Cadeau");
    }

    #[test]
    fn test_ensure_stock() {
        let mut p = product(1, "Oud");
        p.stock = 3;
        assert!(ensure_stock(&p, 1, 2).is_ok());

        let err = ensure_stock(&p, 2, 2).unwrap_err();
        assert!(matches!(&err, AppError::Conflict(msg) if msg.contains("3 disponible")));

        p.stock = 0;
        let err = ensure_stock(&p, 0, 1).unwrap_err();
        assert!(matches!(&err, AppError::Conflict(msg) if msg.contains("rupture")));
    }

    #[test]
    fn test_cart_owner() {
        assert_eq!(CartOwner::of(None), CartOwner::Guest);
        assert_eq!(CartOwner::Guest.user_id(), None);
        assert_eq!(
            CartOwner::Account(UserId::new(4)).user_id(),
            Some(UserId::new(4))
        );
    }

    #[tokio::test]
    async fn test_settle_promo_saves_changed_terms() {
        let saved = promo(None);
        let session = session_with(&saved).await;
        let updated = AppliedPromo {
            discount: 20,
            ..saved.clone()
        };

        let kept = settle_promo(
            &session,
            &saved,
            Revalidation::Keep(updated.clone()),
            PromoStage::Checkout,
        )
        .await
        .unwrap();

        assert_eq!(kept, Some(updated.clone()));
        assert_eq!(stored_promo(&session).await, Some(updated));
    }

    #[tokio::test]
    async fn test_settle_promo_drops_deleted_code_even_at_checkout() {
        let saved = promo(None);
        let session = session_with(&saved).await;

        let kept = settle_promo(&session, &saved, Revalidation::Gone, PromoStage::Checkout)
            .await
            .unwrap();

        assert_eq!(kept, None);
        assert_eq!(stored_promo(&session).await, None);
    }

    #[tokio::test]
    async fn test_settle_promo_below_minimum_is_dropped_while_browsing() {
        let saved = promo(None);
        let session = session_with(&saved).await;
        let rejection = PromoRejection::BelowMinimum {
            minimum: Decimal::from(100),
        };

        let kept = settle_promo(
            &session,
            &saved,
            Revalidation::Rejected(rejection),
            PromoStage::Browsing,
        )
        .await
        .unwrap();

        assert_eq!(kept, None);
        assert_eq!(stored_promo(&session).await, None);
    }

    #[tokio::test]
    async fn test_settle_promo_rejection_fails_checkout() {
        let saved = promo(None);
        let session = session_with(&saved).await;

        let err = settle_promo(
            &session,
            &saved,
            Revalidation::Rejected(PromoRejection::AlreadyUsed),
            PromoStage::Checkout,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Promo(PromoRejection::AlreadyUsed)));
        assert_eq!(stored_promo(&session).await, None);
    }
}
