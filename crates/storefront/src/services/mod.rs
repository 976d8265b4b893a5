//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `accounts` - Account standing checks for sessions
//! - `auth` - Email and password accounts
//! - `cart` - Guest and account carts, promo codes, quotes
//! - `catalog` - Cached catalog listings
//! - `checkout` - Order placement
//! - `mailer` - Transactional email
//! - `payments` - Payment intents
//! - `realtime` - Database change feed
//! - `sweeper` - Abandoned-cart snapshots

pub mod accounts;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod mailer;
pub mod payments;
pub mod realtime;
pub mod sweeper;
