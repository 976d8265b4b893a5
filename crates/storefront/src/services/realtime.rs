//! Realtime change feed.
//!
//! Database triggers publish every row change on the `rayha_changes` channel.
//! A single background task listens on that channel and fans the events out
//! to in-process subscribers (SSE connections, the catalog cache) through a
//! broadcast channel.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tokio::sync::broadcast;

use rayha_core::UserId;

/// Notification channel the triggers publish on.
pub const CHANNEL: &str = "rayha_changes";

/// Broadcast buffer. Slow subscribers past this many events lag and resync.
const FEED_CAPACITY: usize = 256;

/// Wait before reconnecting a failed listener.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Table a change happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTable {
    Products,
    CartItems,
    Wishlist,
    Orders,
    PromoCodes,
    AbandonedCarts,
    OlfactoryNotes,
    LayeringDuos,
}

impl ChangeTable {
    /// Public merchandising data every shopper sees.
    #[must_use]
    pub const fn is_catalog(self) -> bool {
        matches!(
            self,
            Self::Products | Self::PromoCodes | Self::OlfactoryNotes | Self::LayeringDuos
        )
    }

    /// Data owned by a single account.
    #[must_use]
    pub const fn is_personal(self) -> bool {
        matches!(self, Self::CartItems | Self::Wishlist | Self::Orders)
    }

    /// Whether cached catalog listings are stale after this change.
    #[must_use]
    pub const fn invalidates_catalog(self) -> bool {
        matches!(self, Self::Products | Self::LayeringDuos)
    }
}

/// Kind of row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// One row change, as published by the database triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: ChangeTable,
    pub op: ChangeOp,
    #[serde(default)]
    pub id: Option<i32>,
    #[serde(default, skip_serializing)]
    pub user_id: Option<UserId>,
}

impl ChangeEvent {
    /// Parse a trigger payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a known change.
    pub fn parse(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    /// Whether a storefront subscriber should see this change.
    ///
    /// Catalog changes go to everyone. Personal changes only reach their owner.
    #[must_use]
    pub fn concerns(&self, user_id: Option<UserId>) -> bool {
        if self.table.is_catalog() {
            return true;
        }
        self.table.is_personal() && user_id.is_some() && self.user_id == user_id
    }
}

/// In-process fan-out of database changes.
#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    /// Create an empty feed.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        Self { sender }
    }

    /// Subscribe to future changes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Publish a change to every current subscriber.
    pub fn publish(&self, event: ChangeEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }
}

/// Listen for database changes forever, reconnecting after failures.
pub async fn run_listener(pool: PgPool, feed: ChangeFeed) {
    loop {
        if let Err(e) = listen(&pool, &feed).await {
            tracing::error!(
                error = %e,
                retry_in_secs = RECONNECT_DELAY.as_secs(),
                "Change listener failed"
            );
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

async fn listen(pool: &PgPool, feed: &ChangeFeed) -> Result<(), sqlx::Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(CHANNEL).await?;
    tracing::info!(channel = CHANNEL, "Listening for database changes");

    loop {
        let notification = listener.recv().await?;
        match ChangeEvent::parse(notification.payload()) {
            Ok(event) => {
                tracing::debug!(table = ?event.table, op = ?event.op, id = ?event.id, "Change");
                feed.publish(event);
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    payload = notification.payload(),
                    "Ignoring malformed change notification"
                );
            }
        }
    }
}
