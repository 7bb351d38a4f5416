//! Application state shared across handlers.

use std::sync::Arc;

use secrecy::ExposeSecret;

use crate::config::AppConfig;
use crate::db::Repository;
use crate::services::{EmailService, TokenSigner};

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("invalid token signing key: {0}")]
    SigningKey(#[from] hmac::digest::InvalidLength),
    #[error("mail transport: {0}")]
    Mailer(#[from] lettre::transport::smtp::Error),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the repository and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    repo: Arc<dyn Repository>,
    email: EmailService,
    tokens: TokenSigner,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Server configuration
    /// * `repo` - Storage backend (`PgRepository` in production)
    ///
    /// # Errors
    ///
    /// Returns an error if the signing key or the SMTP relay is unusable.
    pub fn new(config: AppConfig, repo: Arc<dyn Repository>) -> Result<Self, StateError> {
        let tokens = TokenSigner::new(
            config.secret_key.expose_secret().as_bytes(),
            &config.token.salt,
            config.token.max_age,
        )?;
        let email = EmailService::new(&config)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                repo,
                email,
                tokens,
            }),
        })
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Get a reference to the storage backend.
    #[must_use]
    pub fn repo(&self) -> &dyn Repository {
        self.inner.repo.as_ref()
    }

    /// Get a reference to the email service.
    #[must_use]
    pub fn email(&self) -> &EmailService {
        &self.inner.email
    }

    /// Get a reference to the confirmation token signer.
    #[must_use]
    pub fn tokens(&self) -> &TokenSigner {
        &self.inner.tokens
    }
}
