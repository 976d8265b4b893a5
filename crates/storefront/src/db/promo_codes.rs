//! Promo code repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};

use rayha_core::promo::{NewPromoCode, PromoCode};
use rayha_core::{ProductId, PromoCodeId};

use super::RepositoryError;

#[derive(sqlx::FromRow)]
struct PromoCodeRow {
    id: PromoCodeId,
    code: String,
    discount: i32,
    active: bool,
    min_amount: Decimal,
    single_use: bool,
    free_shipping: bool,
    free_product_id: Option<ProductId>,
    free_product_label: Option<String>,
    usage_count: i32,
    created_at: DateTime<Utc>,
}

impl From<PromoCodeRow> for PromoCode {
    fn from(row: PromoCodeRow) -> Self {
        Self {
            id: row.id,
            code: row.code,
            discount: row.discount,
            active: row.active,
            min_amount: row.min_amount,
            single_use: row.single_use,
            free_shipping: row.free_shipping,
            free_product_id: row.free_product_id,
            free_product_label: row.free_product_label,
            usage_count: row.usage_count,
            created_at: row.created_at,
        }
    }
}

const PROMO_COLUMNS: &str = "id, code, discount, active, min_amount, single_use, free_shipping, \
     free_product_id, free_product_label, usage_count, created_at";

async fn fetch_by_code<'e>(
    executor: impl PgExecutor<'e>,
    code: &str,
) -> Result<Option<PromoCode>, RepositoryError> {
    let row = sqlx::query_as::<_, PromoCodeRow>(&format!(
        "SELECT {PROMO_COLUMNS} FROM rayha.promo_codes WHERE code = $1"
    ))
    .bind(code)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(PromoCode::from))
}

/// Repository for promo codes. Codes are looked up in normalized form.
pub struct PromoCodeRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PromoCodeRepository<'a> {
    /// Create a new promo code repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All codes, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<PromoCode>, RepositoryError> {
        let rows = sqlx::query_as::<_, PromoCodeRow>(&format!(
            "SELECT {PROMO_COLUMNS} FROM rayha.promo_codes ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(PromoCode::from).collect())
    }

    /// Look up a normalized code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_code(&self, code: &str) -> Result<Option<PromoCode>, RepositoryError> {
        fetch_by_code(self.pool, code).await
    }

    /// Look up a normalized code inside a transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_code_in(
        tx: &mut Transaction<'_, Postgres>,
        code: &str,
    ) -> Result<Option<PromoCode>, RepositoryError> {
        fetch_by_code(&mut **tx, code).await
    }

    /// Insert an already validated code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code already exists.
    pub async fn create(&self, promo: &NewPromoCode) -> Result<PromoCode, RepositoryError> {
        let row = sqlx::query_as::<_, PromoCodeRow>(&format!(
            "INSERT INTO rayha.promo_codes
                 (code, discount, min_amount, single_use, free_shipping, free_product_id,
                  free_product_label)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {PROMO_COLUMNS}"
        ))
        .bind(&promo.code)
        .bind(promo.discount)
        .bind(promo.min_amount)
        .bind(promo.single_use)
        .bind(promo.free_shipping)
        .bind(promo.free_product_id)
        .bind(&promo.free_product_label)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            RepositoryError::conflict_on_unique(e, &format!("Le code {} existe déjà", promo.code))
        })?;

        Ok(row.into())
    }

    /// Delete a code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the code does not exist.
    pub async fn delete(&self, id: PromoCodeId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM rayha.promo_codes WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Flip a code between active and inactive.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the code does not exist.
    pub async fn toggle(&self, id: PromoCodeId) -> Result<PromoCode, RepositoryError> {
        let row = sqlx::query_as::<_, PromoCodeRow>(&format!(
            "UPDATE rayha.promo_codes SET active = NOT active
             WHERE id = $1
             RETURNING {PROMO_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Count one more use of a code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn increment_usage(
        tx: &mut Transaction<'_, Postgres>,
        code: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE rayha.promo_codes SET usage_count = usage_count + 1 WHERE code = $1")
            .bind(code)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}
