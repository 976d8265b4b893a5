//! Abandoned cart repository for the recovery CRM.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

use rayha_core::AbandonedCartId;
use rayha_core::abandoned::AbandonedCart;
use rayha_core::cart::CartLine;

use super::RepositoryError;

#[derive(sqlx::FromRow)]
struct AbandonedCartRow {
    id: AbandonedCartId,
    client_id: Option<String>,
    client_name: String,
    client_email: String,
    items: Json<Vec<CartLine>>,
    total_value: Decimal,
    abandoned_at: DateTime<Utc>,
    recovery_attempts: i32,
    last_recovery_email: Option<DateTime<Utc>>,
    recovered: bool,
    recovery_date: Option<DateTime<Utc>>,
    discount_offered: Option<i32>,
}

impl From<AbandonedCartRow> for AbandonedCart {
    fn from(row: AbandonedCartRow) -> Self {
        Self {
            id: row.id,
            client_id: row.client_id,
            client_name: row.client_name,
            client_email: row.client_email,
            items: row.items.0,
            total_value: row.total_value,
            abandoned_at: row.abandoned_at,
            recovery_attempts: row.recovery_attempts,
            last_recovery_email: row.last_recovery_email,
            recovered: row.recovered,
            recovery_date: row.recovery_date,
            discount_offered: row.discount_offered,
        }
    }
}

const CART_COLUMNS: &str = "id, client_id, client_name, client_email, items, total_value, \
     abandoned_at, recovery_attempts, last_recovery_email, recovered, recovery_date, \
     discount_offered";

/// A cart snapshot to record.
#[derive(Debug, Clone)]
pub struct CartSnapshot<'a> {
    pub client_id: Option<&'a str>,
    pub client_name: &'a str,
    pub client_email: &'a str,
    pub items: &'a [CartLine],
    pub total_value: Decimal,
    pub abandoned_at: DateTime<Utc>,
}

/// Repository for abandoned carts.
pub struct AbandonedCartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AbandonedCartRepository<'a> {
    /// Create a new abandoned cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All recorded carts, most recently abandoned first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<AbandonedCart>, RepositoryError> {
        let rows = sqlx::query_as::<_, AbandonedCartRow>(&format!(
            "SELECT {CART_COLUMNS} FROM rayha.abandoned_carts ORDER BY abandoned_at DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(AbandonedCart::from).collect())
    }

    /// Get one cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: AbandonedCartId) -> Result<Option<AbandonedCart>, RepositoryError> {
        let row = sqlx::query_as::<_, AbandonedCartRow>(&format!(
            "SELECT {CART_COLUMNS} FROM rayha.abandoned_carts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(AbandonedCart::from))
    }

    /// Record a snapshot, keyed by client when one is given.
    ///
    /// A pending cart for the same client gets its lines refreshed. A cart
    /// that was recovered before `abandoned_at` starts over as a new
    /// abandonment. Returns `None` when nothing changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn upsert(
        &self,
        snapshot: &CartSnapshot<'_>,
    ) -> Result<Option<AbandonedCart>, RepositoryError> {
        let row = sqlx::query_as::<_, AbandonedCartRow>(&format!(
            "INSERT INTO rayha.abandoned_carts
                 (client_id, client_name, client_email, items, total_value, abandoned_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (client_id) DO UPDATE SET
                 client_name = EXCLUDED.client_name,
                 client_email = EXCLUDED.client_email,
                 items = EXCLUDED.items,
                 total_value = EXCLUDED.total_value,
                 abandoned_at = CASE WHEN rayha.abandoned_carts.recovered
                     THEN EXCLUDED.abandoned_at ELSE rayha.abandoned_carts.abandoned_at END,
                 recovery_attempts = CASE WHEN rayha.abandoned_carts.recovered
                     THEN 0 ELSE rayha.abandoned_carts.recovery_attempts END,
                 last_recovery_email = CASE WHEN rayha.abandoned_carts.recovered
                     THEN NULL ELSE rayha.abandoned_carts.last_recovery_email END,
                 discount_offered = CASE WHEN rayha.abandoned_carts.recovered
                     THEN NULL ELSE rayha.abandoned_carts.discount_offered END,
                 recovery_date = NULL,
                 recovered = FALSE
             WHERE (rayha.abandoned_carts.recovered
                    AND rayha.abandoned_carts.recovery_date < EXCLUDED.abandoned_at)
                OR (NOT rayha.abandoned_carts.recovered
                    AND rayha.abandoned_carts.items IS DISTINCT FROM EXCLUDED.items)
             RETURNING {CART_COLUMNS}"
        ))
        .bind(snapshot.client_id)
        .bind(snapshot.client_name)
        .bind(snapshot.client_email)
        .bind(Json(snapshot.items))
        .bind(snapshot.total_value)
        .bind(snapshot.abandoned_at)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(AbandonedCart::from))
    }

    /// Persist recovery progress made on a cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the cart does not exist.
    pub async fn save_recovery(
        &self,
        cart: &AbandonedCart,
    ) -> Result<AbandonedCart, RepositoryError> {
        let row = sqlx::query_as::<_, AbandonedCartRow>(&format!(
            "UPDATE rayha.abandoned_carts SET
                 recovery_attempts = $2,
                 last_recovery_email = $3,
                 discount_offered = $4,
                 recovered = $5,
                 recovery_date = $6
             WHERE id = $1
             RETURNING {CART_COLUMNS}"
        ))
        .bind(cart.id)
        .bind(cart.recovery_attempts)
        .bind(cart.last_recovery_email)
        .bind(cart.discount_offered)
        .bind(cart.recovered)
        .bind(cart.recovery_date)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Mark the pending carts of a shopper as recovered after a checkout.
    ///
    /// Matches on client ID when known, otherwise on email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_recovered_for(
        tx: &mut Transaction<'_, Postgres>,
        client_id: Option<&str>,
        email: &str,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE rayha.abandoned_carts SET recovered = TRUE, recovery_date = NOW()
             WHERE NOT recovered
               AND (client_id = $1 OR LOWER(client_email) = LOWER($2))",
        )
        .bind(client_id)
        .bind(email)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected())
    }
}
