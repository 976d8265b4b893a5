//! Back-office catalog: products, stock, sales velocity and the featured
//! selection.

use std::collections::HashSet;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use rayha_core::ProductId;
use rayha_core::catalog::{Direction, Product, ProductInput, move_item, normalize_featured};
use rayha_core::inventory::{days_of_cover, daily_velocity, monthly_from_weekly, weekly_velocity};

use crate::db::ProductRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// A product with its stock metrics.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductAdminView {
    #[serde(flatten)]
    pub product: Product,
    pub daily_velocity: Decimal,
    pub weekly_velocity: Decimal,
    /// Days until stock-out at the current pace; absent when nothing sells.
    pub days_of_cover: Option<Decimal>,
}

impl From<Product> for ProductAdminView {
    fn from(product: Product) -> Self {
        Self {
            daily_velocity: daily_velocity(product.monthly_sales),
            weekly_velocity: weekly_velocity(product.monthly_sales),
            days_of_cover: days_of_cover(product.stock, product.monthly_sales),
            product,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StockRequest {
    pub stock: i32,
}

/// Sales velocity update. A weekly figure wins over a monthly one.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VelocityRequest {
    #[serde(default)]
    pub monthly_sales: Option<i32>,
    #[serde(default)]
    pub weekly_sales: Option<Decimal>,
}

impl VelocityRequest {
    fn monthly(&self) -> Option<i32> {
        self.weekly_sales
            .map(monthly_from_weekly)
            .or(self.monthly_sales)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturedRequest {
    pub product_ids: Vec<ProductId>,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub direction: Direction,
}

fn normalize_input(input: ProductInput) -> Result<ProductInput> {
    input
        .normalize()
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

/// Every product, newest first, with stock metrics.
#[instrument(skip(state, _admin))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<ProductAdminView>>> {
    let products = ProductRepository::new(state.pool()).list().await?;
    Ok(Json(products.into_iter().map(Into::into).collect()))
}

/// Create a product. Families are derived from the notes when none are given.
#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<ProductAdminView>)> {
    let input = normalize_input(input)?;
    let product = ProductRepository::new(state.pool()).create(&input).await?;
    state.catalog().invalidate();
    tracing::info!(product_id = %product.id, name = %product.name, "Product created");
    Ok((StatusCode::CREATED, Json(product.into())))
}

/// Replace a product's details.
#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(input): Json<ProductInput>,
) -> Result<Json<ProductAdminView>> {
    let input = normalize_input(input)?;
    let product = ProductRepository::new(state.pool()).update(id, &input).await?;
    state.catalog().invalidate();
    Ok(Json(product.into()))
}

/// Delete a product.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    ProductRepository::new(state.pool()).delete(id).await?;
    state.catalog().invalidate();
    tracing::info!(product_id = %id, "Product deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Set the stock on hand. Negative values are stored as zero.
#[instrument(skip(state, _admin))]
pub async fn set_stock(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(req): Json<StockRequest>,
) -> Result<Json<ProductAdminView>> {
    let product = ProductRepository::new(state.pool())
        .set_stock(id, req.stock)
        .await?;
    state.catalog().invalidate();
    Ok(Json(product.into()))
}

/// Set the sales velocity from a monthly or weekly figure.
#[instrument(skip(state, _admin))]
pub async fn set_velocity(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(req): Json<VelocityRequest>,
) -> Result<Json<ProductAdminView>> {
    let monthly = req.monthly().ok_or_else(|| {
        AppError::BadRequest("Indiquez des ventes mensuelles ou hebdomadaires".to_owned())
    })?;
    let product = ProductRepository::new(state.pool())
        .set_monthly_sales(id, monthly)
        .await?;
    state.catalog().invalidate();
    Ok(Json(product.into()))
}

/// The featured selection, in display order.
#[instrument(skip(state, _admin))]
pub async fn featured(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(
        ProductRepository::new(state.pool()).list_featured().await?,
    ))
}

/// Replace the featured selection. Unknown and repeated ids are dropped.
#[instrument(skip(state, _admin, req))]
pub async fn set_featured(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Json(req): Json<FeaturedRequest>,
) -> Result<Json<Vec<Product>>> {
    let repo = ProductRepository::new(state.pool());
    let valid: HashSet<ProductId> = repo.list().await?.iter().map(|p| p.id).collect();
    let ids = normalize_featured(&req.product_ids, &valid);

    repo.set_featured(&ids).await?;
    state.catalog().invalidate();
    tracing::info!(count = ids.len(), "Featured selection updated");
    Ok(Json(repo.list_featured().await?))
}

/// Move a featured product one place up or down.
#[instrument(skip(state, _admin))]
pub async fn move_featured(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(req): Json<MoveRequest>,
) -> Result<Json<Vec<Product>>> {
    let repo = ProductRepository::new(state.pool());
    let mut featured = repo.list_featured().await?;
    if !featured.iter().any(|p| p.id == id) {
        return Err(AppError::NotFound(
            "Ce produit n'est pas dans la sélection".to_owned(),
        ));
    }

    if move_item(&mut featured, |p| p.id, &id, req.direction) {
        let ids: Vec<ProductId> = featured.iter().map(|p| p.id).collect();
        repo.set_featured(&ids).await?;
        state.catalog().invalidate();
    }
    Ok(Json(repo.list_featured().await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::product;

    #[test]
    fn test_weekly_figure_wins() {
        let req = VelocityRequest {
            monthly_sales: Some(10),
            weekly_sales: Some(Decimal::from(10)),
        };
        assert_eq!(req.monthly(), Some(43));

        let req = VelocityRequest {
            monthly_sales: Some(12),
            weekly_sales: None,
        };
        assert_eq!(req.monthly(), Some(12));

        let req = VelocityRequest {
            monthly_sales: None,
            weekly_sales: None,
        };
        assert_eq!(req.monthly(), None);
    }

    #[test]
    fn test_admin_view_metrics() {
        let mut p = product(1, "Oud Royal");
        p.stock = 20;
        p.monthly_sales = 30;
        let view = ProductAdminView::from(p);
        assert_eq!(view.daily_velocity, Decimal::ONE);
        assert_eq!(view.days_of_cover, Some(Decimal::from(20)));

        let mut idle = product(2, "Musc Blanc");
        idle.monthly_sales = 0;
        assert_eq!(ProductAdminView::from(idle).days_of_cover, None);
    }
}
