//! Order repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};

use rayha_core::cart::CartLine;
use rayha_core::promo::PriorOrder;
use rayha_core::{OrderId, OrderStatus, UserId};

use super::RepositoryError;
use crate::models::{NewOrder, Order};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    reference: String,
    user_id: Option<UserId>,
    user_name: String,
    user_email: String,
    items: Json<Vec<CartLine>>,
    subtotal: Decimal,
    shipping_cost: Decimal,
    total_amount: Decimal,
    shipping_address: serde_json::Value,
    status: OrderStatus,
    pending_at: Option<DateTime<Utc>>,
    confirmed_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    notes: Option<String>,
    promo_code: Option<String>,
    promo_discount: Option<i32>,
    payment_intent_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            reference: row.reference,
            user_id: row.user_id,
            user_name: row.user_name,
            user_email: row.user_email,
            items: row.items.0,
            subtotal: row.subtotal,
            shipping_cost: row.shipping_cost,
            total_amount: row.total_amount,
            shipping_address: row.shipping_address,
            status: row.status,
            pending_at: row.pending_at,
            confirmed_at: row.confirmed_at,
            shipped_at: row.shipped_at,
            delivered_at: row.delivered_at,
            cancelled_at: row.cancelled_at,
            notes: row.notes,
            promo_code: row.promo_code,
            promo_discount: row.promo_discount,
            payment_intent_id: row.payment_intent_id,
            created_at: row.created_at,
        }
    }
}

const ORDER_COLUMNS: &str = "id, reference, user_id, user_name, user_email, items, subtotal, \
     shipping_cost, total_amount, shipping_address, status, pending_at, confirmed_at, shipped_at, \
     delivered_at, cancelled_at, notes, promo_code, promo_discount, payment_intent_id, created_at";

/// Column stamped when an order enters `status`.
const fn status_timestamp_column(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "pending_at",
        OrderStatus::Confirmed => "confirmed_at",
        OrderStatus::Shipped => "shipped_at",
        OrderStatus::Delivered => "delivered_at",
        OrderStatus::Cancelled => "cancelled_at",
    }
}

async fn fetch_prior_orders<'e>(
    executor: impl PgExecutor<'e>,
    user_id: UserId,
) -> Result<Vec<PriorOrder>, RepositoryError> {
    let rows: Vec<(Option<String>, OrderStatus)> = sqlx::query_as(
        "SELECT promo_code, status FROM rayha.orders
         WHERE user_id = $1 AND promo_code IS NOT NULL",
    )
    .bind(user_id)
    .fetch_all(executor)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(promo_code, status)| PriorOrder { promo_code, status })
        .collect())
}

/// Repository for orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a pending order inside the checkout transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` on a reference collision.
    pub async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        order: &NewOrder<'_>,
    ) -> Result<Order, RepositoryError> {
        let quote = order.quote;
        let promo_discount = quote.promo_code.as_ref().map(|_| quote.discount_percent);

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO rayha.orders
                 (reference, user_id, user_name, user_email, items, subtotal, shipping_cost,
                  total_amount, shipping_address, status, pending_at, notes, promo_code,
                  promo_discount, payment_intent_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'pending', NOW(), $10, $11, $12, $13)
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(&order.reference)
        .bind(order.user_id)
        .bind(&order.customer.name)
        .bind(&order.customer.email)
        .bind(Json(&quote.lines))
        .bind(quote.subtotal)
        .bind(quote.shipping_cost)
        .bind(quote.total)
        .bind(order.shipping_address)
        .bind(order.notes)
        .bind(&quote.promo_code)
        .bind(promo_discount)
        .bind(order.payment_intent_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| RepositoryError::conflict_on_unique(e, "order reference already exists"))?;

        Ok(row.into())
    }

    /// An account's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM rayha.orders
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    /// Every order, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM rayha.orders ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    /// Promo history of an account, for single-use checks.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn prior_orders(&self, user_id: UserId) -> Result<Vec<PriorOrder>, RepositoryError> {
        fetch_prior_orders(self.pool, user_id).await
    }

    /// Promo history of an account, read inside a transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn prior_orders_in(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
    ) -> Result<Vec<PriorOrder>, RepositoryError> {
        fetch_prior_orders(&mut **tx, user_id).await
    }

    /// Move an order to `status` and stamp the matching timestamp.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let column = status_timestamp_column(status);
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE rayha.orders SET status = $2, {column} = NOW()
             WHERE id = $1
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn delete(&self, id: OrderId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM rayha.orders WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_status_has_its_own_timestamp() {
        let columns: std::collections::HashSet<_> = OrderStatus::ALL
            .into_iter()
            .map(status_timestamp_column)
            .collect();
        assert_eq!(columns.len(), OrderStatus::ALL.len());
        assert_eq!(status_timestamp_column(OrderStatus::Shipped), "shipped_at");
    }
}
