//! Rayha Core - Shared types and store rules.
//!
//! This crate holds everything about the perfume store that does not touch
//! I/O: identifiers and statuses, cart arithmetic, promo-code eligibility,
//! order pricing, stock planning, abandoned-cart triage and olfactory
//! classification. It is used by:
//! - `storefront` - JSON API for the shop and its back-office
//! - `cli` - Command-line tools for migrations, seeding and admin accounts
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, emails, money helpers and status enums
//! - [`cart`] - Cart lines, merge and totals
//! - [`promo`] - Promo codes and checkout eligibility
//! - [`checkout`] - Shipping, discounts and order references
//! - [`inventory`] - Stock deduction and sales velocity
//! - [`abandoned`] - Abandoned-cart priorities and CRM statistics
//! - [`olfactory`] - Olfactory families and note classification
//! - [`catalog`] - Products, filters and curated orderings

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod abandoned;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod inventory;
pub mod olfactory;
pub mod promo;
pub mod types;

pub use types::*;
