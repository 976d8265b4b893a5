//! Product repository: catalog, stock and featured ordering.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use rayha_core::catalog::{Product, ProductInput};
use rayha_core::inventory::{StockChange, StockLevel};
use rayha_core::olfactory::OlfactoryFamily;
use rayha_core::{Gender, ProductId};

use super::RepositoryError;

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    brand: String,
    price: Decimal,
    image_url: Option<String>,
    scent: Option<String>,
    category: Option<String>,
    concentration: Option<String>,
    gender: Gender,
    families: Vec<String>,
    description: Option<String>,
    notes_tete: Vec<String>,
    notes_coeur: Vec<String>,
    notes_fond: Vec<String>,
    volume: Option<String>,
    stock: i32,
    monthly_sales: i32,
    is_featured: bool,
    featured_order: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let families = row
            .families
            .iter()
            .map(|f| f.parse::<OlfactoryFamily>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(RepositoryError::DataCorruption)?;

        Ok(Self {
            id: row.id,
            name: row.name,
            brand: row.brand,
            price: row.price,
            image_url: row.image_url,
            scent: row.scent,
            category: row.category,
            concentration: row.concentration,
            gender: row.gender,
            families,
            description: row.description,
            notes_tete: row.notes_tete,
            notes_coeur: row.notes_coeur,
            notes_fond: row.notes_fond,
            volume: row.volume,
            stock: row.stock,
            monthly_sales: row.monthly_sales,
            is_featured: row.is_featured,
            featured_order: row.featured_order,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn family_labels(families: &[OlfactoryFamily]) -> Vec<String> {
    families.iter().map(|f| f.label().to_owned()).collect()
}

const PRODUCT_COLUMNS: &str = "id, name, brand, price, image_url, scent, category, concentration, \
     gender, families, description, notes_tete, notes_coeur, notes_fond, volume, stock, \
     monthly_sales, is_featured, featured_order, created_at, updated_at";

fn into_products(rows: Vec<ProductRow>) -> Result<Vec<Product>, RepositoryError> {
    rows.into_iter().map(Product::try_from).collect()
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM rayha.products ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        into_products(rows)
    }

    /// Featured products in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_featured(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM rayha.products
             WHERE is_featured
             ORDER BY featured_order NULLS LAST, id"
        ))
        .fetch_all(self.pool)
        .await?;

        into_products(rows)
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM rayha.products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    /// Get several products at once, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM rayha.products WHERE id = ANY($1)"
        ))
        .bind(raw)
        .fetch_all(self.pool)
        .await?;

        into_products(rows)
    }

    /// Insert a product. The input must already be normalized.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "INSERT INTO rayha.products
                 (name, brand, price, image_url, scent, category, concentration, gender,
                  families, description, notes_tete, notes_coeur, notes_fond, volume,
                  stock, monthly_sales)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(&input.name)
        .bind(&input.brand)
        .bind(input.price)
        .bind(&input.image_url)
        .bind(&input.scent)
        .bind(&input.category)
        .bind(&input.concentration)
        .bind(input.gender)
        .bind(family_labels(&input.families))
        .bind(&input.description)
        .bind(&input.notes_tete)
        .bind(&input.notes_coeur)
        .bind(&input.notes_fond)
        .bind(&input.volume)
        .bind(input.stock)
        .bind(input.monthly_sales)
        .fetch_one(self.pool)
        .await?;

        Product::try_from(row)
    }

    /// Replace the editable fields of a product.
    ///
    /// Cart lines snapshot name and price, so they are refreshed in the same
    /// transaction to keep every open cart in line with the catalog.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "UPDATE rayha.products SET
                 name = $2, brand = $3, price = $4, image_url = $5, scent = $6, category = $7,
                 concentration = $8, gender = $9, families = $10, description = $11,
                 notes_tete = $12, notes_coeur = $13, notes_fond = $14, volume = $15,
                 stock = $16, monthly_sales = $17, updated_at = NOW()
             WHERE id = $1
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .bind(&input.name)
        .bind(&input.brand)
        .bind(input.price)
        .bind(&input.image_url)
        .bind(&input.scent)
        .bind(&input.category)
        .bind(&input.concentration)
        .bind(input.gender)
        .bind(family_labels(&input.families))
        .bind(&input.description)
        .bind(&input.notes_tete)
        .bind(&input.notes_coeur)
        .bind(&input.notes_fond)
        .bind(&input.volume)
        .bind(input.stock)
        .bind(input.monthly_sales)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        sqlx::query(
            "UPDATE rayha.cart_items
             SET name = $2, brand = $3, price = $4, image_url = $5, scent = $6, category = $7
             WHERE product_id = $1",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.brand)
        .bind(input.price)
        .bind(&input.image_url)
        .bind(&input.scent)
        .bind(&input.category)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Product::try_from(row)
    }

    /// Delete a product. Cart lines, favorites and duos go with it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM rayha.products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Set the stock on hand.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn set_stock(&self, id: ProductId, stock: i32) -> Result<Product, RepositoryError> {
        self.update_counter(id, "stock", stock).await
    }

    /// Set the monthly sales figure used for velocity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn set_monthly_sales(
        &self,
        id: ProductId,
        monthly_sales: i32,
    ) -> Result<Product, RepositoryError> {
        self.update_counter(id, "monthly_sales", monthly_sales)
            .await
    }

    async fn update_counter(
        &self,
        id: ProductId,
        column: &'static str,
        value: i32,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "UPDATE rayha.products SET {column} = GREATEST($2, 0), updated_at = NOW()
             WHERE id = $1
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .bind(value)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Product::try_from(row)
    }

    /// Replace the featured selection with `ids`, in that order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_featured(&self, ids: &[ProductId]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE rayha.products SET is_featured = FALSE, featured_order = NULL
             WHERE is_featured",
        )
        .execute(&mut *tx)
        .await?;

        for (position, id) in (0_i32..).zip(ids) {
            sqlx::query(
                "UPDATE rayha.products SET is_featured = TRUE, featured_order = $2
                 WHERE id = $1",
            )
            .bind(id)
            .bind(position)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Lock the stock rows of `ids` for the rest of the transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock_stock_levels(
        tx: &mut Transaction<'_, Postgres>,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, StockLevel>, RepositoryError> {
        let raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let rows: Vec<(ProductId, i32, i32)> = sqlx::query_as(
            "SELECT id, stock, monthly_sales FROM rayha.products
             WHERE id = ANY($1)
             ORDER BY id
             FOR UPDATE",
        )
        .bind(raw)
        .fetch_all(&mut **tx)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, stock, monthly_sales)| {
                (
                    id,
                    StockLevel {
                        stock,
                        monthly_sales,
                    },
                )
            })
            .collect())
    }

    /// Write planned stock changes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if an update fails.
    pub async fn apply_stock_changes(
        tx: &mut Transaction<'_, Postgres>,
        changes: &[StockChange],
    ) -> Result<(), RepositoryError> {
        for change in changes {
            sqlx::query(
                "UPDATE rayha.products
                 SET stock = $2, monthly_sales = $3, updated_at = NOW()
                 WHERE id = $1",
            )
            .bind(change.product_id)
            .bind(change.new_stock)
            .bind(change.new_monthly_sales)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}
