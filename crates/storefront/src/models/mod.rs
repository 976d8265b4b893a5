//! Domain models for the storefront.
//!
//! These are validated domain objects, separate from the row types used by
//! the repositories in [`crate::db`]. Catalog, cart, promo and CRM types live
//! in `rayha_core`; the types here are the ones only the service needs.

pub mod merchandising;
pub mod order;
pub mod session;
pub mod user;

pub use merchandising::{
    LayeringDuo, LayeringDuoInput, LayeringDuoView, OlfactoryNote, OlfactoryNoteInput,
};
pub use order::{CustomerDetails, NewOrder, Order};
pub use session::{CurrentUser, keys as session_keys};
pub use user::User;
