//! Domain models for the server.
//!
//! Household and shopping list types live in `grocery-squad-core`; this
//! module holds the account model and the session payload.

pub mod account;
pub mod session;

pub use account::{Account, NewAccount};
pub use session::{CurrentUser, keys as session_keys};
