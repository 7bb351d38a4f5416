//! Confirmation token commands.
//!
//! Useful for support: re-issue a link by hand, or find out why a user's
//! link was rejected.
//!
//! # Environment Variables
//!
//! Same as the server: `GROCERY_SECRET_KEY`, `TOKEN_EMAIL_SALT`,
//! `TOKEN_EMAIL_MAX_AGE` and `GROCERY_BASE_URL`.

use secrecy::ExposeSecret;
use thiserror::Error;

use grocery_squad_core::{Email, EmailError};
use grocery_squad_server::config::{AppConfig, ConfigError};
use grocery_squad_server::services::{TokenError, TokenSigner};

/// Errors that can occur during token operations.
#[derive(Debug, Error)]
pub enum TokenCommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Token rejected: {0}")]
    Rejected(#[from] TokenError),
}

fn signer(config: &AppConfig) -> Result<TokenSigner, TokenCommandError> {
    TokenSigner::new(
        config.secret_key.expose_secret().as_bytes(),
        &config.token.salt,
        config.token.max_age,
    )
    .map_err(|e| ConfigError::InvalidEnvVar("GROCERY_SECRET_KEY".to_owned(), e.to_string()).into())
}

/// Print a fresh token and the link a user would receive.
///
/// # Errors
///
/// Fails on invalid configuration or an invalid address.
pub fn issue(email: &str) -> Result<(), TokenCommandError> {
    let config = AppConfig::from_env()?;
    let email = Email::parse(email)?;
    let token = signer(&config)?.issue(&email);

    let link = format!(
        "{}/confirm_email/{token}",
        config.base_url.as_str().trim_end_matches('/')
    );

    #[allow(clippy::print_stdout)]
    {
        println!("Token: {token}");
        println!("Link:  {link}");
        println!("Valid for {} minutes", config.token.max_age.as_secs() / 60);
    }
    Ok(())
}

/// Verify a token and print the address it confirms.
///
/// # Errors
///
/// Fails on invalid configuration, or with the reason the token is rejected.
pub fn verify(token: &str) -> Result<(), TokenCommandError> {
    let config = AppConfig::from_env()?;
    let email = signer(&config)?.verify(token)?;

    #[allow(clippy::print_stdout)]
    {
        println!("Valid token for {email}");
    }
    Ok(())
}
