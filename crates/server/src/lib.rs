//! Grocery Squad server library.
//!
//! This crate provides the HTTP backend as a library, so the binary, the CLI
//! and the integration tests all build the same application.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

pub use routes::app;
