//! Storefront analytics: page views and add-to-cart events.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;

use rayha_core::ProductId;

use super::RepositoryError;

/// A page view to record.
#[derive(Debug, Clone)]
pub struct PageView<'a> {
    pub session_id: &'a str,
    pub path: &'a str,
    pub product_id: Option<ProductId>,
    pub device: Option<&'a str>,
}

/// Views of one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProductViews {
    pub product_id: ProductId,
    pub name: String,
    pub views: i64,
    pub add_to_carts: i64,
}

/// Views per device class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DeviceViews {
    pub device: String,
    pub views: i64,
}

/// Views per day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DailyViews {
    pub day: NaiveDate,
    pub views: i64,
    pub visitors: i64,
}

/// Back-office traffic summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub since: DateTime<Utc>,
    pub page_views: i64,
    pub unique_visitors: i64,
    pub add_to_carts: i64,
    pub top_products: Vec<ProductViews>,
    pub devices: Vec<DeviceViews>,
    pub daily: Vec<DailyViews>,
}

const TOP_PRODUCTS: i64 = 10;

/// Repository for analytics events.
pub struct AnalyticsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AnalyticsRepository<'a> {
    /// Create a new analytics repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record a page view.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn record_page_view(&self, view: &PageView<'_>) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO rayha.page_views (session_id, path, product_id, device)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(view.session_id)
        .bind(view.path)
        .bind(view.product_id)
        .bind(view.device)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Record a product being added to a cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn record_add_to_cart(&self, product_id: ProductId) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO rayha.add_to_cart_events (product_id) VALUES ($1)")
            .bind(product_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Summarize traffic since `since`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn summary(&self, since: DateTime<Utc>) -> Result<AnalyticsSummary, RepositoryError> {
        let (page_views, unique_visitors): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(DISTINCT session_id)
             FROM rayha.page_views WHERE created_at >= $1",
        )
        .bind(since)
        .fetch_one(self.pool)
        .await?;

        let (add_to_carts,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM rayha.add_to_cart_events WHERE created_at >= $1",
        )
        .bind(since)
        .fetch_one(self.pool)
        .await?;

        let top_products = sqlx::query_as::<_, ProductViews>(
            "SELECT p.id AS product_id, p.name,
                    (SELECT COUNT(*) FROM rayha.page_views v
                     WHERE v.product_id = p.id AND v.created_at >= $1) AS views,
                    (SELECT COUNT(*) FROM rayha.add_to_cart_events e
                     WHERE e.product_id = p.id AND e.created_at >= $1) AS add_to_carts
             FROM rayha.products p
             ORDER BY views DESC, add_to_carts DESC, p.id
             LIMIT $2",
        )
        .bind(since)
        .bind(TOP_PRODUCTS)
        .fetch_all(self.pool)
        .await?;

        let devices = sqlx::query_as::<_, DeviceViews>(
            "SELECT COALESCE(device, 'inconnu') AS device, COUNT(*) AS views
             FROM rayha.page_views WHERE created_at >= $1
             GROUP BY 1
             ORDER BY views DESC",
        )
        .bind(since)
        .fetch_all(self.pool)
        .await?;

        let daily = sqlx::query_as::<_, DailyViews>(
            "SELECT (created_at AT TIME ZONE 'UTC')::date AS day,
                    COUNT(*) AS views, COUNT(DISTINCT session_id) AS visitors
             FROM rayha.page_views WHERE created_at >= $1
             GROUP BY 1
             ORDER BY 1",
        )
        .bind(since)
        .fetch_all(self.pool)
        .await?;

        Ok(AnalyticsSummary {
            since,
            page_views,
            unique_visitors,
            add_to_carts,
            top_products,
            devices,
            daily,
        })
    }
}
