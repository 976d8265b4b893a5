//! Database operations for the storefront `PostgreSQL` database.
//!
//! The database is the source of truth for the whole store. Every table lives
//! in the `rayha` schema:
//!
//! - `users` - Shopper and admin accounts
//! - `products` - Catalog, stock and featured ordering
//! - `cart_items` / `wishlist` - Per-account cart and favorites
//! - `orders` - Placed orders with a JSONB line snapshot
//! - `promo_codes` - Discount codes
//! - `abandoned_carts` - CRM snapshots of idle carts
//! - `olfactory_notes` / `layering_duos` - Merchandising metadata
//! - `page_views` / `add_to_cart_events` - Storefront analytics
//!
//! Sessions are stored by `tower-sessions-sqlx-store` in `tower_sessions.session`.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p rayha-cli -- migrate
//! ```

pub mod abandoned_carts;
pub mod analytics;
pub mod carts;
pub mod layering;
pub mod olfactory_notes;
pub mod orders;
pub mod products;
pub mod promo_codes;
pub mod users;
pub mod wishlist;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use abandoned_carts::AbandonedCartRepository;
pub use analytics::AnalyticsRepository;
pub use carts::CartRepository;
pub use layering::LayeringRepository;
pub use olfactory_notes::OlfactoryNoteRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use promo_codes::PromoCodeRepository;
pub use users::UserRepository;
pub use wishlist::WishlistRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique violation to [`RepositoryError::Conflict`] with `message`.
    pub(crate) fn conflict_on_unique(e: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(e)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
