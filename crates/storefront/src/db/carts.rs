//! Cart repository: one row per (account, product).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};

use rayha_core::cart::{Cart, CartLine};
use rayha_core::{ProductId, UserId};

use super::RepositoryError;

#[derive(sqlx::FromRow)]
struct CartItemRow {
    product_id: ProductId,
    name: String,
    brand: String,
    price: Decimal,
    image_url: Option<String>,
    scent: Option<String>,
    category: Option<String>,
    quantity: i32,
}

impl TryFrom<CartItemRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartItemRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "negative quantity {} for product {}",
                row.quantity, row.product_id
            ))
        })?;
        Ok(Self {
            product_id: row.product_id,
            name: row.name,
            brand: row.brand,
            unit_price: row.price,
            image_url: row.image_url,
            scent: row.scent,
            category: row.category,
            quantity,
        })
    }
}

/// When an account's cart was last touched.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CartActivity {
    pub user_id: UserId,
    pub email: String,
    pub username: Option<String>,
    pub last_activity: DateTime<Utc>,
}

fn quantity_param(quantity: u32) -> i32 {
    i32::try_from(quantity).unwrap_or(i32::MAX)
}

async fn fetch_cart<'e>(
    executor: impl PgExecutor<'e>,
    user_id: UserId,
) -> Result<Cart, RepositoryError> {
    let rows = sqlx::query_as::<_, CartItemRow>(
        "SELECT product_id, name, brand, price, image_url, scent, category, quantity
         FROM rayha.cart_items
         WHERE user_id = $1
         ORDER BY created_at, id",
    )
    .bind(user_id)
    .fetch_all(executor)
    .await?;

    let lines = rows
        .into_iter()
        .map(CartLine::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Cart::from_lines(lines))
}

async fn upsert_line<'e>(
    executor: impl PgExecutor<'e>,
    user_id: UserId,
    line: &CartLine,
) -> Result<i32, RepositoryError> {
    let (quantity,): (i32,) = sqlx::query_as(
        "INSERT INTO rayha.cart_items
             (user_id, product_id, quantity, name, brand, price, image_url, scent, category)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         ON CONFLICT (user_id, product_id) DO UPDATE SET
             quantity = rayha.cart_items.quantity + EXCLUDED.quantity,
             name = EXCLUDED.name,
             brand = EXCLUDED.brand,
             price = EXCLUDED.price,
             image_url = EXCLUDED.image_url,
             scent = EXCLUDED.scent,
             category = EXCLUDED.category,
             updated_at = NOW()
         RETURNING quantity",
    )
    .bind(user_id)
    .bind(line.product_id)
    .bind(quantity_param(line.quantity))
    .bind(&line.name)
    .bind(&line.brand)
    .bind(line.unit_price)
    .bind(&line.image_url)
    .bind(&line.scent)
    .bind(&line.category)
    .fetch_one(executor)
    .await?;

    Ok(quantity)
}

/// Repository for account carts.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load an account's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        fetch_cart(self.pool, user_id).await
    }

    /// Load an account's cart inside a transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_in(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
    ) -> Result<Cart, RepositoryError> {
        fetch_cart(&mut **tx, user_id).await
    }

    /// Add `line` to the cart, summing with any existing quantity.
    ///
    /// Returns the line's new quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn add(&self, user_id: UserId, line: &CartLine) -> Result<u32, RepositoryError> {
        let quantity = upsert_line(self.pool, user_id, line).await?;
        Ok(u32::try_from(quantity).unwrap_or_default())
    }

    /// Set a line's quantity; zero or less removes it.
    ///
    /// Returns whether a line was changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<bool, RepositoryError> {
        if quantity <= 0 {
            return self.remove(user_id, product_id).await;
        }

        let result = sqlx::query(
            "UPDATE rayha.cart_items SET quantity = $3, updated_at = NOW()
             WHERE user_id = $1 AND product_id = $2",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(i32::try_from(quantity).unwrap_or(i32::MAX))
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn remove(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM rayha.cart_items WHERE user_id = $1 AND product_id = $2")
                .bind(user_id)
                .bind(product_id)
                .execute(self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        Self::clear_in_executor(self.pool, user_id).await
    }

    /// Empty the cart inside a transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn clear_in(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
    ) -> Result<(), RepositoryError> {
        Self::clear_in_executor(&mut **tx, user_id).await
    }

    async fn clear_in_executor<'e>(
        executor: impl PgExecutor<'e>,
        user_id: UserId,
    ) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM rayha.cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Fold guest lines into the account cart, summing quantities per product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any upsert fails; nothing is
    /// merged in that case.
    pub async fn merge(&self, user_id: UserId, lines: &[CartLine]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        for line in lines {
            upsert_line(&mut *tx, user_id, line).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Last activity of every non-empty account cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn activity(&self) -> Result<Vec<CartActivity>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartActivity>(
            "SELECT u.id AS user_id, u.email, u.username, MAX(c.updated_at) AS last_activity
             FROM rayha.cart_items c
             JOIN rayha.users u ON u.id = c.user_id
             GROUP BY u.id, u.email, u.username",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }
}
