//! Grocery Squad Core - Shared domain library.
//!
//! This crate provides the domain model used across all Grocery Squad components:
//! - `server` - JSON web backend (accounts, households, shopping lists)
//! - `cli` - Command-line tools for migrations and account management
//!
//! # Architecture
//!
//! The core crate contains only types and rules - no I/O, no database access,
//! no HTTP. Handlers load state, ask the types here whether an operation is
//! allowed, and then persist the outcome.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, emails and length-bounded names
//! - [`household`] - Household membership and the member/admin predicates
//! - [`shopping_list`] - Shopping list items and their bought lifecycle

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod household;
pub mod shopping_list;
pub mod types;

pub use household::{Household, Member, MembershipError};
pub use shopping_list::{Purchase, ShoppingListError, ShoppingListItem};
pub use types::*;
