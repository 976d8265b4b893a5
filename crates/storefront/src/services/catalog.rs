//! Cached catalog reads.
//!
//! Product listings and layering duos are read on every storefront page, so
//! they are held in a `moka` cache for a few minutes. The cache is dropped
//! whenever the change feed reports a product or duo write, and immediately
//! after back-office writes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, instrument};

use rayha_core::ProductId;
use rayha_core::catalog::Product;

use crate::db::{LayeringRepository, ProductRepository, RepositoryError};
use crate::models::{LayeringDuo, LayeringDuoView};
use crate::services::realtime::ChangeFeed;

const CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CacheKey {
    Products,
    Featured,
    Layering,
}

#[derive(Clone)]
enum CacheValue {
    Products(Arc<Vec<Product>>),
    Layering(Arc<Vec<LayeringDuoView>>),
}

/// Read-through cache over the catalog tables.
#[derive(Clone)]
pub struct CatalogCache {
    cache: Cache<CacheKey, CacheValue>,
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        let cache = Cache::builder()
            .max_capacity(16)
            .time_to_live(CACHE_TTL)
            .build();
        Self { cache }
    }

    /// All products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if loading from the database fails.
    #[instrument(skip_all)]
    pub async fn products(&self, pool: &PgPool) -> Result<Arc<Vec<Product>>, RepositoryError> {
        if let Some(CacheValue::Products(products)) = self.cache.get(&CacheKey::Products).await {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let products = Arc::new(ProductRepository::new(pool).list().await?);
        self.cache
            .insert(CacheKey::Products, CacheValue::Products(Arc::clone(&products)))
            .await;
        Ok(products)
    }

    /// Featured products in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if loading from the database fails.
    #[instrument(skip_all)]
    pub async fn featured(&self, pool: &PgPool) -> Result<Arc<Vec<Product>>, RepositoryError> {
        if let Some(CacheValue::Products(products)) = self.cache.get(&CacheKey::Featured).await {
            debug!("Cache hit for featured products");
            return Ok(products);
        }

        let products = Arc::new(ProductRepository::new(pool).list_featured().await?);
        self.cache
            .insert(CacheKey::Featured, CacheValue::Products(Arc::clone(&products)))
            .await;
        Ok(products)
    }

    /// Active layering duos with both products resolved.
    ///
    /// Duos whose products have disappeared are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if loading from the database fails.
    #[instrument(skip_all)]
    pub async fn layering(
        &self,
        pool: &PgPool,
    ) -> Result<Arc<Vec<LayeringDuoView>>, RepositoryError> {
        if let Some(CacheValue::Layering(duos)) = self.cache.get(&CacheKey::Layering).await {
            debug!("Cache hit for layering duos");
            return Ok(duos);
        }

        let products = self.products(pool).await?;
        let duos = LayeringRepository::new(pool).list_active().await?;
        let views = Arc::new(resolve_duos(duos, &products));
        self.cache
            .insert(CacheKey::Layering, CacheValue::Layering(Arc::clone(&views)))
            .await;
        Ok(views)
    }

    /// Drop every cached listing.
    pub fn invalidate(&self) {
        self.cache.invalidate_all();
    }
}

/// Pair each duo with its two products.
pub fn resolve_duos(
    duos: Vec<LayeringDuo>,
    products: &[Product],
) -> Vec<LayeringDuoView> {
    let by_id: HashMap<ProductId, &Product> = products.iter().map(|p| (p.id, p)).collect();
    duos.into_iter()
        .filter_map(|duo| {
            let a = by_id.get(&duo.product_id_a)?;
            let b = by_id.get(&duo.product_id_b)?;
            Some(LayeringDuoView::new(duo, (*a).clone(), (*b).clone()))
        })
        .collect()
}

/// Drop the cache whenever the catalog changes.
pub async fn run_invalidator(feed: ChangeFeed, cache: CatalogCache) {
    let mut events = feed.subscribe();
    loop {
        match events.recv().await {
            Ok(event) if event.table.invalidates_catalog() => cache.invalidate(),
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "Catalog invalidator lagged");
                cache.invalidate();
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use rayha_core::LayeringDuoId;

    use super::*;
    use crate::test_fixtures::product;

    fn duo(id: i32, a: i32, b: i32) -> LayeringDuo {
        LayeringDuo {
            id: LayeringDuoId::new(id),
            name: format!("Duo {id}"),
            description: None,
            product_id_a: ProductId::new(a),
            product_id_b: ProductId::new(b),
            is_active: true,
            sort_order: id,
            custom_price: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_resolve_duos_skips_missing_products() {
        let products = vec![product(1, "Oud"), product(2, "Rose")];
        let views = resolve_duos(vec![duo(1, 1, 2), duo(2, 1, 99)], &products);
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].product_a.name, "Oud");
        assert_eq!(views[0].price, products[0].price + products[1].price);
    }

    #[test]
    fn test_custom_price_wins() {
        let products = vec![product(1, "Oud"), product(2, "Rose")];
        let mut d = duo(1, 1, 2);
        d.custom_price = Some(Decimal::new(9900, 2));
        let views = resolve_duos(vec![d], &products);
        assert_eq!(views[0].price, Decimal::new(9900, 2));
    }
}
