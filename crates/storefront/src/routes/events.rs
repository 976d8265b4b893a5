//! Server-sent events: live updates from the change feed.
//!
//! Shoppers get catalog changes plus whole-state snapshots of their own cart
//! and favorites whenever those change. The back-office stream forwards
//! every change. A subscriber that falls behind the feed gets a `resync`
//! event (and fresh snapshots) instead of the events it missed.

use std::convert::Infallible;

use async_stream::stream;
use axum::{
    extract::State,
    response::{
        Sse,
        sse::{Event, KeepAlive},
    },
};
use futures::Stream;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use rayha_core::cart::{CartLine, CartSummary};
use rayha_core::{ProductId, UserId};

use crate::db::{CartRepository, WishlistRepository};
use crate::middleware::{OptionalAuth, RequireAdmin};
use crate::services::realtime::{ChangeEvent, ChangeTable};
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CartSnapshot {
    items: Vec<CartLine>,
    summary: CartSummary,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FavoritesSnapshot {
    product_ids: Vec<ProductId>,
}

fn json_event(name: &str, payload: &impl Serialize) -> Option<Event> {
    match Event::default().event(name).json_data(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(error = %e, event = name, "Failed to encode event");
            None
        }
    }
}

fn change_event(change: &ChangeEvent) -> Option<Event> {
    json_event("change", change)
}

fn resync_event() -> Event {
    Event::default().event("resync").data("{}")
}

async fn cart_event(state: &AppState, user_id: UserId) -> Option<Event> {
    match CartRepository::new(state.pool()).get(user_id).await {
        Ok(cart) => json_event(
            "cart",
            &CartSnapshot {
                summary: cart.summary(),
                items: cart.into_lines(),
            },
        ),
        Err(e) => {
            tracing::warn!(error = %e, %user_id, "Failed to load cart snapshot");
            None
        }
    }
}

async fn favorites_event(state: &AppState, user_id: UserId) -> Option<Event> {
    match WishlistRepository::new(state.pool()).list(user_id).await {
        Ok(product_ids) => json_event("favorites", &FavoritesSnapshot { product_ids }),
        Err(e) => {
            tracing::warn!(error = %e, %user_id, "Failed to load favorites snapshot");
            None
        }
    }
}

async fn personal_snapshot(state: &AppState, user_id: UserId) -> Vec<Event> {
    let mut events = Vec::with_capacity(2);
    events.extend(cart_event(state, user_id).await);
    events.extend(favorites_event(state, user_id).await);
    events
}

/// Storefront event stream.
pub async fn storefront(
    State(state): State<AppState>,
    auth: OptionalAuth,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let user_id = auth.0.map(|u| u.id);
    let mut changes = state.changes().subscribe();

    let events = stream! {
        if let Some(user_id) = user_id {
            for event in personal_snapshot(&state, user_id).await {
                yield Ok(event);
            }
        }

        loop {
            match changes.recv().await {
                Ok(change) if change.concerns(user_id) => {
                    let event = match (change.table, user_id) {
                        (ChangeTable::CartItems, Some(user_id)) => cart_event(&state, user_id).await,
                        (ChangeTable::Wishlist, Some(user_id)) => {
                            favorites_event(&state, user_id).await
                        }
                        _ => change_event(&change),
                    };
                    if let Some(event) = event {
                        yield Ok(event);
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Storefront subscriber lagged, resyncing");
                    yield Ok(resync_event());
                    if let Some(user_id) = user_id {
                        for event in personal_snapshot(&state, user_id).await {
                            yield Ok(event);
                        }
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Back-office event stream: every change.
pub async fn admin(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut changes = state.changes().subscribe();

    let events = stream! {
        loop {
            match changes.recv().await {
                Ok(change) => {
                    if let Some(event) = change_event(&change) {
                        yield Ok(event);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Admin subscriber lagged, resyncing");
                    yield Ok(resync_event());
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(events).keep_alive(KeepAlive::default())
}
