//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Registration, login, password and username changes
//! - `household` - Household creation, joining and administration
//! - `shopping_list` - Adding and listing shopping list items
//! - `token` - Signed, expiring email confirmation tokens
//! - `email` - Transactional email (SMTP or log-only)
//! - `confirmation` - Email confirmation flow built on `token` and `email`
//!
//! Services borrow the repository for the length of a request and never
//! touch the session; handlers own that.

pub mod auth;
pub mod confirmation;
pub mod email;
pub mod household;
pub mod password;
pub mod shopping_list;
pub mod token;

pub use auth::{AuthError, AuthService, PasswordChange, Registration};
pub use confirmation::{ConfirmationError, ConfirmationService};
pub use email::{EmailError, EmailService};
pub use household::{HouseholdError, HouseholdService};
pub use shopping_list::{ShoppingListError, ShoppingListService};
pub use token::{TokenError, TokenSigner};

/// The value, unless it is absent or blank.
pub(crate) fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
