//! Checkout: turn the current cart into an order.
//!
//! Everything that must change together happens in one transaction: stock
//! rows are locked and decremented, the order is inserted, the promo usage
//! counter moves, the account cart is emptied, and any pending abandoned-cart
//! record of the shopper is marked recovered. Any failure rolls all of it back.

use serde::Deserialize;
use sqlx::PgPool;
use tower_sessions::Session;
use tracing::instrument;

use rayha_core::Email;
use rayha_core::cart::Cart;
use rayha_core::catalog::Product;
use rayha_core::checkout::{generate_reference, price_order};
use rayha_core::inventory::plan_stock_deduction;
use rayha_core::promo::{AppliedPromo, revalidate};

use crate::db::{
    AbandonedCartRepository, CartRepository, OrderRepository, ProductRepository,
    PromoCodeRepository, RepositoryError,
};
use crate::error::{AppError, Result};
use crate::models::{CurrentUser, CustomerDetails, NewOrder, Order, session_keys};
use crate::services::cart::{CartOwner, CartService, PromoStage, gift_line, settle_promo};

/// Checkout form.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub customer: CustomerDetails,
    pub shipping_address: serde_json::Value,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub payment_intent_id: Option<String>,
}

impl CheckoutRequest {
    /// Trim the form and check the customer details.
    fn validate(mut self) -> Result<Self> {
        self.customer.name = self.customer.name.trim().to_owned();
        if self.customer.name.is_empty() {
            return Err(AppError::BadRequest("Le nom est obligatoire".to_owned()));
        }
        let email = Email::parse(&self.customer.email)
            .map_err(|_| AppError::BadRequest("Adresse email invalide".to_owned()))?;
        self.customer.email = email.into_inner();

        if !self.shipping_address.is_object() {
            return Err(AppError::BadRequest(
                "L'adresse de livraison est obligatoire".to_owned(),
            ));
        }

        self.notes = self
            .notes
            .map(|n| n.trim().to_owned())
            .filter(|n| !n.is_empty());
        self.payment_intent_id = self
            .payment_intent_id
            .map(|p| p.trim().to_owned())
            .filter(|p| !p.is_empty());
        Ok(self)
    }
}

/// Place an order for the current cart.
///
/// # Errors
///
/// - `AppError::BadRequest` for an empty cart or invalid form
/// - `AppError::Promo` when the applied code no longer applies
/// - `AppError::Stock` when any line cannot be served
#[instrument(skip(pool, session, request), fields(user_id = ?user.map(|u| u.id)))]
pub async fn place_order(
    pool: &PgPool,
    session: &Session,
    user: Option<&CurrentUser>,
    request: CheckoutRequest,
) -> Result<Order> {
    let request = request.validate()?;
    let owner = CartOwner::of(user);

    let mut tx = pool.begin().await.map_err(RepositoryError::from)?;

    let cart: Cart = match owner {
        CartOwner::Account(user_id) => CartRepository::get_in(&mut tx, user_id).await?,
        CartOwner::Guest => CartService::new(pool, session, owner).load().await?,
    };
    if cart.is_empty() {
        return Err(AppError::BadRequest("Votre panier est vide".to_owned()));
    }

    let promo = refresh_promo(&mut tx, session, owner, &cart).await?;

    let gift = match promo.as_ref().and_then(|p| p.free_product_id) {
        Some(product_id) => ProductRepository::new(pool)
            .get(product_id)
            .await?
            .filter(Product::in_stock),
        None => None,
    };
    let quote = price_order(
        &cart,
        promo.as_ref(),
        promo
            .as_ref()
            .zip(gift.as_ref())
            .map(|(p, product)| gift_line(p, product)),
    );

    let items: Vec<_> = quote
        .lines
        .iter()
        .map(|l| (l.product_id, l.quantity))
        .collect();
    let ids: Vec<_> = items.iter().map(|(id, _)| *id).collect();
    let levels = ProductRepository::lock_stock_levels(&mut tx, &ids).await?;
    let changes = plan_stock_deduction(&levels, &items)?;
    ProductRepository::apply_stock_changes(&mut tx, &changes).await?;

    let order = OrderRepository::insert(
        &mut tx,
        &NewOrder {
            reference: generate_reference(),
            user_id: owner.user_id(),
            customer: &request.customer,
            quote: &quote,
            shipping_address: &request.shipping_address,
            notes: request.notes.as_deref(),
            payment_intent_id: request.payment_intent_id.as_deref(),
        },
    )
    .await?;

    if let Some(code) = &quote.promo_code {
        PromoCodeRepository::increment_usage(&mut tx, code).await?;
    }

    if let CartOwner::Account(user_id) = owner {
        CartRepository::clear_in(&mut tx, user_id).await?;
    }

    let client_id = owner.user_id().map(|id| id.to_string());
    let recovered = AbandonedCartRepository::mark_recovered_for(
        &mut tx,
        client_id.as_deref(),
        &request.customer.email,
    )
    .await?;

    tx.commit().await.map_err(RepositoryError::from)?;

    session.remove::<Cart>(session_keys::GUEST_CART).await?;
    session
        .remove::<AppliedPromo>(session_keys::GUEST_PROMO)
        .await?;

    tracing::info!(
        reference = %order.reference,
        total = %order.total_amount,
        lines = order.items.len(),
        recovered_carts = recovered,
        "Order placed"
    );
    Ok(order)
}

/// Re-read the applied promo inside the checkout transaction.
///
/// A code that was deleted or deactivated since it was applied is silently
/// dropped. A code that still exists but no longer fits the order fails the
/// checkout so the shopper does not pay a price they were not shown.
async fn refresh_promo(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    session: &Session,
    owner: CartOwner,
    cart: &Cart,
) -> Result<Option<AppliedPromo>> {
    let Some(saved) = session
        .get::<AppliedPromo>(session_keys::GUEST_PROMO)
        .await?
    else {
        return Ok(None);
    };

    let live = PromoCodeRepository::get_by_code_in(tx, &saved.code).await?;
    let prior = match (&live, owner.user_id()) {
        (Some(promo), Some(user_id)) if promo.single_use => {
            OrderRepository::prior_orders_in(tx, user_id).await?
        }
        _ => Vec::new(),
    };
    let outcome = revalidate(
        saved.clone(),
        live.as_ref(),
        cart.subtotal(),
        owner.user_id(),
        &prior,
    );
    settle_promo(session, &saved, outcome, PromoStage::Checkout).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn request(name: &str, email: &str) -> CheckoutRequest {
        CheckoutRequest {
            customer: CustomerDetails {
                name: name.to_owned(),
                email: email.to_owned(),
            },
            shipping_address: json!({"street": "12 rue des Lilas", "city": "Lyon", "zip": "69003"}),
            notes: Some("   ".to_owned()),
            payment_intent_id: Some(" pi_123 ".to_owned()),
        }
    }

    #[test]
    fn test_validate_trims_and_normalizes() {
        let req = request("  Amina ", "Amina@Example.com").validate().unwrap();
        assert_eq!(req.customer.name, "Amina");
        assert_eq!(req.notes, None);
        assert_eq!(req.payment_intent_id.as_deref(), Some("pi_123"));
    }

    #[test]
    fn test_validate_rejects_missing_name() {
        assert!(matches!(
            request("  ", "a@b.fr").validate(),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_email() {
        assert!(matches!(
            request("Amina", "pas-un-email").validate(),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_validate_requires_address_object() {
        let mut req = request("Amina", "a@b.fr");
        req.shipping_address = json!("Lyon");
        assert!(matches!(req.validate(), Err(AppError::BadRequest(_))));
    }
}
