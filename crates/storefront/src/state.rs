//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::services::accounts::AccountCache;
use crate::services::catalog::CatalogCache;
use crate::services::mailer::{Mailer, MailerError};
use crate::services::payments::{PaymentClient, PaymentError};
use crate::services::realtime::ChangeFeed;

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("payment client: {0}")]
    Payments(#[from] PaymentError),
    #[error("mailer: {0}")]
    Mailer(#[from] MailerError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    changes: ChangeFeed,
    catalog: CatalogCache,
    accounts: AccountCache,
    payments: PaymentClient,
    mailer: Mailer,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `pool` - `PostgreSQL` connection pool
    ///
    /// # Errors
    ///
    /// Returns an error if an outbound HTTP client cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let payments = PaymentClient::new(&config.payments, config.remote_timeout)?;
        let mailer = Mailer::new(&config.email, &config.base_url, config.remote_timeout)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                changes: ChangeFeed::new(),
                catalog: CatalogCache::new(),
                accounts: AccountCache::new(),
                payments,
                mailer,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Database change feed.
    #[must_use]
    pub fn changes(&self) -> &ChangeFeed {
        &self.inner.changes
    }

    /// Cached catalog listings.
    #[must_use]
    pub fn catalog(&self) -> &CatalogCache {
        &self.inner.catalog
    }

    /// Standing of signed-in accounts.
    #[must_use]
    pub fn accounts(&self) -> &AccountCache {
        &self.inner.accounts
    }

    /// Payment processor client.
    #[must_use]
    pub fn payments(&self) -> &PaymentClient {
        &self.inner.payments
    }

    /// Transactional email client.
    #[must_use]
    pub fn mailer(&self) -> &Mailer {
        &self.inner.mailer
    }
}
