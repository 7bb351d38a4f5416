//! Signed, expiring email confirmation tokens.
//!
//! A token is three URL-safe base64 segments joined by `.`:
//! the email address, the issue time (big-endian unix seconds) and an
//! HMAC-SHA256 over the first two segments. The signing key is derived from
//! the application secret and a salt, so tokens minted for one purpose do not
//! verify for another.
//!
//! Tokens are stateless: nothing is stored, and a token stays valid until it
//! ages out even after it has been used once.

use std::time::Duration;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac, digest::InvalidLength};
use sha2::Sha256;
use thiserror::Error;

use grocery_squad_core::Email;

type HmacSha256 = Hmac<Sha256>;

/// Reasons a token fails verification.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("bad token signature")]
    BadSignature,

    #[error("token expired")]
    Expired,
}

/// Issues and verifies confirmation tokens.
#[derive(Clone)]
pub struct TokenSigner {
    mac: HmacSha256,
    max_age: Duration,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    /// Build a signer from the application secret and a purpose salt.
    ///
    /// # Errors
    ///
    /// Never fails in practice; HMAC accepts keys of any length.
    pub fn new(secret: &[u8], salt: &str, max_age: Duration) -> Result<Self, InvalidLength> {
        let mut derive = HmacSha256::new_from_slice(secret)?;
        derive.update(salt.as_bytes());
        let key = derive.finalize().into_bytes();

        Ok(Self {
            mac: HmacSha256::new_from_slice(&key)?,
            max_age,
        })
    }

    /// How long issued tokens stay valid.
    #[must_use]
    pub const fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Issue a token for `email`, stamped now.
    #[must_use]
    pub fn issue(&self, email: &Email) -> String {
        self.issue_at(email, Utc::now())
    }

    /// Issue a token for `email`, stamped at `issued_at`.
    #[must_use]
    pub fn issue_at(&self, email: &Email, issued_at: DateTime<Utc>) -> String {
        let timestamp = u64::try_from(issued_at.timestamp()).unwrap_or(0);
        let payload = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(email.as_str()),
            URL_SAFE_NO_PAD.encode(timestamp.to_be_bytes())
        );
        let signature = URL_SAFE_NO_PAD.encode(self.sign(&payload));
        format!("{payload}.{signature}")
    }

    /// Verify a token against the current time.
    ///
    /// # Errors
    ///
    /// See [`TokenSigner::verify_at`].
    pub fn verify(&self, token: &str) -> Result<Email, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token as of `now` and return the email it was issued for.
    ///
    /// The signature is checked before the age, so a forged token is always
    /// reported as `BadSignature`.
    ///
    /// # Errors
    ///
    /// Returns `Malformed`, `BadSignature` or `Expired`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Email, TokenError> {
        let (payload, signature) = token.rsplit_once('.').ok_or(TokenError::Malformed)?;
        let (email_part, time_part) = payload.split_once('.').ok_or(TokenError::Malformed)?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let time: [u8; 8] = URL_SAFE_NO_PAD
            .decode(time_part)
            .map_err(|_| TokenError::Malformed)?
            .try_into()
            .map_err(|_| TokenError::Malformed)?;
        let issued_at = i64::try_from(u64::from_be_bytes(time)).map_err(|_| TokenError::Malformed)?;

        let age = now.timestamp().saturating_sub(issued_at);
        let max_age = i64::try_from(self.max_age.as_secs()).unwrap_or(i64::MAX);
        if age > max_age {
            return Err(TokenError::Expired);
        }

        let email = URL_SAFE_NO_PAD
            .decode(email_part)
            .map_err(|_| TokenError::Malformed)?;
        let email = String::from_utf8(email).map_err(|_| TokenError::Malformed)?;
        Email::parse(&email).map_err(|_| TokenError::Malformed)
    }

    fn sign(&self, payload: &str) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}
