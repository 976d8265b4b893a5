//! Abandoned-cart CRM.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use rayha_core::AbandonedCartId;
use rayha_core::abandoned::{
    AbandonedCart, CartFilter, CrmStats, ProductInsight, RecoveryPriority, filter_carts,
    product_insights, statistics,
};
use rayha_core::cart::CartLine;

use crate::db::AbandonedCartRepository;
use crate::db::abandoned_carts::CartSnapshot;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// A cart with its follow-up priority.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbandonedCartView {
    #[serde(flatten)]
    pub cart: AbandonedCart,
    pub priority: RecoveryPriority,
    pub priority_label: &'static str,
    pub hours_since_abandoned: i64,
}

impl AbandonedCartView {
    fn new(cart: AbandonedCart, now: DateTime<Utc>) -> Self {
        let priority = cart.priority(now);
        Self {
            hours_since_abandoned: cart.hours_since_abandoned(now),
            priority,
            priority_label: priority.label(),
            cart,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub filter: CartFilter,
}

/// A cart recorded by hand from the back-office.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordCartRequest {
    #[serde(default)]
    pub client_id: Option<String>,
    pub client_name: String,
    pub client_email: String,
    pub items: Vec<CartLine>,
    #[serde(default)]
    pub abandoned_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecoveryEmailRequest {
    /// Percentage offered in the email.
    #[serde(default)]
    pub discount: Option<i32>,
}

async fn load(state: &AppState, id: AbandonedCartId) -> Result<AbandonedCart> {
    AbandonedCartRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Panier introuvable".to_owned()))
}

/// Carts matching the filter, most pressing first.
#[instrument(skip(state, _admin))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<AbandonedCartView>>> {
    let carts = AbandonedCartRepository::new(state.pool()).list().await?;
    let now = Utc::now();
    let views = filter_carts(&carts, query.filter, now)
        .into_iter()
        .map(|cart| AbandonedCartView::new(cart.clone(), now))
        .collect();
    Ok(Json(views))
}

/// Record a cart by hand.
///
/// Answers 201 with the record, or 204 when an identical pending record
/// already exists for that client.
#[instrument(skip(state, _admin, req))]
pub async fn record(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Json(req): Json<RecordCartRequest>,
) -> Result<Response> {
    let client_name = req.client_name.trim();
    let client_email = req.client_email.trim();
    if client_name.is_empty() || client_email.is_empty() {
        return Err(AppError::BadRequest(
            "Le nom et l'email du client sont obligatoires".to_owned(),
        ));
    }
    if req.items.is_empty() {
        return Err(AppError::BadRequest("Le panier est vide".to_owned()));
    }

    let snapshot = CartSnapshot {
        client_id: req
            .client_id
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty()),
        client_name,
        client_email,
        items: &req.items,
        total_value: req.items.iter().map(CartLine::line_total).sum(),
        abandoned_at: req.abandoned_at.unwrap_or_else(Utc::now),
    };

    let recorded = AbandonedCartRepository::new(state.pool())
        .upsert(&snapshot)
        .await?;
    Ok(match recorded {
        Some(cart) => {
            let view = AbandonedCartView::new(cart, Utc::now());
            (StatusCode::CREATED, Json(view)).into_response()
        }
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// Record that a recovery email went out.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn recovery_email(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<AbandonedCartId>,
    body: Option<Json<RecoveryEmailRequest>>,
) -> Result<Json<AbandonedCartView>> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    if let Some(discount) = req.discount
        && !(1..=100).contains(&discount)
    {
        return Err(AppError::BadRequest(
            "La réduction doit être comprise entre 1 et 100 %".to_owned(),
        ));
    }

    let mut cart = load(&state, id).await?;
    if cart.recovered {
        return Err(AppError::Conflict("Ce panier a déjà été récupéré".to_owned()));
    }

    let now = Utc::now();
    cart.record_recovery_email(now, req.discount);
    let cart = AbandonedCartRepository::new(state.pool())
        .save_recovery(&cart)
        .await?;
    tracing::info!(
        cart_id = %cart.id,
        attempts = cart.recovery_attempts,
        "Recovery email recorded"
    );
    Ok(Json(AbandonedCartView::new(cart, now)))
}

/// Mark a cart as recovered.
#[instrument(skip(state, _admin))]
pub async fn mark_recovered(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<AbandonedCartId>,
) -> Result<Json<AbandonedCartView>> {
    let mut cart = load(&state, id).await?;
    let now = Utc::now();
    if !cart.recovered {
        cart.mark_recovered(now);
        cart = AbandonedCartRepository::new(state.pool())
            .save_recovery(&cart)
            .await?;
    }
    Ok(Json(AbandonedCartView::new(cart, now)))
}

/// Headline recovery numbers.
#[instrument(skip(state, _admin))]
pub async fn stats(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<CrmStats>> {
    let carts = AbandonedCartRepository::new(state.pool()).list().await?;
    Ok(Json(statistics(&carts)))
}

/// Products most often left behind.
#[instrument(skip(state, _admin))]
pub async fn insights(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<ProductInsight>>> {
    let carts = AbandonedCartRepository::new(state.pool()).list().await?;
    Ok(Json(product_insights(&carts)))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rust_decimal::Decimal;

    use super::*;

    fn cart(hours_ago: i64, attempts: i32) -> AbandonedCart {
        AbandonedCart {
            id: AbandonedCartId::new(1),
            client_id: Some("7".to_owned()),
            client_name: "Yasmine".to_owned(),
            client_email: "yasmine@example.com".to_owned(),
            items: Vec::new(),
            total_value: Decimal::from(120),
            abandoned_at: Utc::now() - Duration::hours(hours_ago),
            recovery_attempts: attempts,
            last_recovery_email: None,
            recovered: false,
            recovery_date: None,
            discount_offered: None,
        }
    }

    #[test]
    fn test_view_carries_priority() {
        let now = Utc::now();
        let view = AbandonedCartView::new(cart(30, 0), now);
        assert_eq!(view.priority, RecoveryPriority::High);
        assert_eq!(view.priority_label, "Prioritaire");
        assert!(view.hours_since_abandoned >= 30);

        let view = AbandonedCartView::new(cart(1, 3), now);
        assert_eq!(view.priority, RecoveryPriority::Urgent);
    }

    #[test]
    fn test_view_serializes_flat() {
        let json = serde_json::to_value(AbandonedCartView::new(cart(2, 0), Utc::now())).unwrap_or_default();
        assert_eq!(json["clientName"], "Yasmine");
        assert_eq!(json["priority"], "normal");
    }
}
