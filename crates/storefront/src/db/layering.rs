//! Layering duo repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use rayha_core::{LayeringDuoId, ProductId};

use super::RepositoryError;
use crate::models::{LayeringDuo, LayeringDuoInput};

#[derive(sqlx::FromRow)]
struct LayeringDuoRow {
    id: LayeringDuoId,
    name: String,
    description: Option<String>,
    product_id_a: ProductId,
    product_id_b: ProductId,
    is_active: bool,
    sort_order: i32,
    custom_price: Option<Decimal>,
    created_at: DateTime<Utc>,
}

impl From<LayeringDuoRow> for LayeringDuo {
    fn from(row: LayeringDuoRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            product_id_a: row.product_id_a,
            product_id_b: row.product_id_b,
            is_active: row.is_active,
            sort_order: row.sort_order,
            custom_price: row.custom_price,
            created_at: row.created_at,
        }
    }
}

const DUO_COLUMNS: &str = "id, name, description, product_id_a, product_id_b, is_active, \
     sort_order, custom_price, created_at";

/// Repository for layering duos.
pub struct LayeringRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> LayeringRepository<'a> {
    /// Create a new layering repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Every duo in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<LayeringDuo>, RepositoryError> {
        self.list_where("TRUE").await
    }

    /// Duos shown on the storefront, in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self) -> Result<Vec<LayeringDuo>, RepositoryError> {
        self.list_where("is_active").await
    }

    async fn list_where(&self, condition: &'static str) -> Result<Vec<LayeringDuo>, RepositoryError> {
        let rows = sqlx::query_as::<_, LayeringDuoRow>(&format!(
            "SELECT {DUO_COLUMNS} FROM rayha.layering_duos
             WHERE {condition}
             ORDER BY sort_order, id"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(LayeringDuo::from).collect())
    }

    /// Add a duo at the end of the list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails, including
    /// when either product does not exist.
    pub async fn create(&self, input: &LayeringDuoInput) -> Result<LayeringDuo, RepositoryError> {
        let row = sqlx::query_as::<_, LayeringDuoRow>(&format!(
            "INSERT INTO rayha.layering_duos
                 (name, description, product_id_a, product_id_b, is_active, custom_price, sort_order)
             VALUES ($1, $2, $3, $4, $5, $6,
                     (SELECT COALESCE(MAX(sort_order) + 1, 0) FROM rayha.layering_duos))
             RETURNING {DUO_COLUMNS}"
        ))
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.product_id_a)
        .bind(input.product_id_b)
        .bind(input.is_active)
        .bind(input.custom_price)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Edit a duo, keeping its position.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the duo does not exist.
    pub async fn update(
        &self,
        id: LayeringDuoId,
        input: &LayeringDuoInput,
    ) -> Result<LayeringDuo, RepositoryError> {
        let row = sqlx::query_as::<_, LayeringDuoRow>(&format!(
            "UPDATE rayha.layering_duos SET
                 name = $2, description = $3, product_id_a = $4, product_id_b = $5,
                 is_active = $6, custom_price = $7
             WHERE id = $1
             RETURNING {DUO_COLUMNS}"
        ))
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.product_id_a)
        .bind(input.product_id_b)
        .bind(input.is_active)
        .bind(input.custom_price)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete a duo.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the duo does not exist.
    pub async fn delete(&self, id: LayeringDuoId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM rayha.layering_duos WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Rewrite `sort_order` so duos appear in the order of `ids`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if an update fails.
    pub async fn set_order(&self, ids: &[LayeringDuoId]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        for (position, id) in (0_i32..).zip(ids) {
            sqlx::query("UPDATE rayha.layering_duos SET sort_order = $2 WHERE id = $1")
                .bind(id)
                .bind(position)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
