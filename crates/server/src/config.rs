//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `GROCERY_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `GROCERY_BASE_URL` - Public origin of the service, used for links and redirect checks
//! - `GROCERY_SECRET_KEY` - Signing secret (min 32 chars, high entropy)
//! - `TOKEN_EMAIL_SALT` - Salt mixed into email confirmation tokens
//!
//! ## Optional
//! - `GROCERY_HOST` - Bind address (default: 127.0.0.1)
//! - `GROCERY_PORT` - Listen port (default: 5000)
//! - `TOKEN_EMAIL_MAX_AGE` - Confirmation token lifetime in seconds (default: 3600)
//! - `GROCERY_REMEMBER_DAYS` - Lifetime of a "remember me" session (default: 30)
//! - `GROCERY_AUTH_RATE_LIMIT` - Per-IP limits on login and registration (default: true)
//! - `SMTP_HOST` - Mail relay; when unset, mail is logged instead of sent
//! - `SMTP_PORT` (default: 587), `SMTP_USERNAME`, `SMTP_PASSWORD`, `SMTP_STARTTLS` (default: true)
//! - `SMTP_FROM` - Sender mailbox (default: `Grocery Squad <noreply@grocery-squad.local>`)
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_SECRET_KEY_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
pub const DEFAULT_MAIL_FROM: &str = "Grocery Squad <noreply@grocery-squad.local>";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public origin of the service
    pub base_url: Url,
    /// Secret used to sign confirmation tokens
    pub secret_key: SecretString,
    /// Email confirmation token settings
    pub token: TokenConfig,
    /// Lifetime of a "remember me" session, in days
    pub remember_days: i64,
    /// Whether login and registration are rate limited per client IP
    pub auth_rate_limit: bool,
    /// Mail relay; `None` logs mail instead of sending it
    pub smtp: Option<SmtpConfig>,
    /// Sender mailbox for outgoing mail
    pub mail_from: String,
    /// Error tracking
    pub sentry: SentryConfig,
}

/// Confirmation token settings.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Salt that scopes tokens to email confirmation
    pub salt: String,
    /// How long a token stays valid
    pub max_age: Duration,
}

/// SMTP relay settings.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    /// Upgrade the connection with STARTTLS; plain SMTP otherwise
    pub starttls: bool,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("starttls", &self.starttls)
            .finish()
    }
}

/// Sentry settings.
#[derive(Debug, Clone)]
pub struct SentryConfig {
    pub dsn: Option<String>,
    pub environment: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: None,
            sample_rate: 1.0,
            traces_sample_rate: 0.0,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("GROCERY_DATABASE_URL")?;
        let host = parse_env_or_default("GROCERY_HOST", "127.0.0.1")?;
        let port = parse_env_or_default("GROCERY_PORT", "5000")?;
        let base_url = parse_base_url("GROCERY_BASE_URL", &get_required_env("GROCERY_BASE_URL")?)?;

        let secret_key = get_validated_secret("GROCERY_SECRET_KEY")?;
        validate_secret_key(&secret_key, "GROCERY_SECRET_KEY")?;

        let token = TokenConfig {
            salt: get_required_env("TOKEN_EMAIL_SALT")?,
            max_age: Duration::from_secs(parse_env_or_default("TOKEN_EMAIL_MAX_AGE", "3600")?),
        };
        let remember_days = parse_env_or_default("GROCERY_REMEMBER_DAYS", "30")?;
        let auth_rate_limit = parse_env_or_default("GROCERY_AUTH_RATE_LIMIT", "true")?;

        let smtp = SmtpConfig::from_env()?;
        let mail_from = get_env_or_default("SMTP_FROM", DEFAULT_MAIL_FROM);
        let sentry = SentryConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            secret_key,
            token,
            remember_days,
            auth_rate_limit,
            smtp,
            mail_from,
            sentry,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` flag.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.scheme() == "https"
    }

    /// Offline configuration for unit tests: no database, no SMTP relay.
    #[cfg(test)]
    #[allow(clippy::unwrap_used)]
    pub(crate) fn for_tests() -> Self {
        Self {
            database_url: SecretString::from("postgres://localhost/grocery_test"),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            base_url: Url::parse("http://localhost:5000").unwrap(),
            secret_key: SecretString::from("k8Jm2vQx9Lp4Wn7Rt1Yz6Bc3Fh5Gd0Sa"),
            token: TokenConfig {
                salt: "email-confirm".to_string(),
                max_age: Duration::from_secs(3600),
            },
            remember_days: 30,
            auth_rate_limit: false,
            smtp: None,
            mail_from: DEFAULT_MAIL_FROM.to_string(),
            sentry: SentryConfig::default(),
        }
    }
}

impl SmtpConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(host) = get_optional_env("SMTP_HOST") else {
            return Ok(None);
        };

        Ok(Some(Self {
            host,
            port: parse_env_or_default("SMTP_PORT", "587")?,
            username: get_optional_env("SMTP_USERNAME"),
            password: get_optional_env("SMTP_PASSWORD").map(SecretString::from),
            starttls: parse_env_or_default("SMTP_STARTTLS", "true")?,
        }))
    }
}

impl SentryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            dsn: get_optional_env("SENTRY_DSN"),
            environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sample_rate: parse_env_or_default("SENTRY_SAMPLE_RATE", "1.0")?,
            traces_sample_rate: parse_env_or_default("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse the public base URL. Only http and https origins are accepted.
fn parse_base_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be an http(s) URL with a host".to_string(),
        ));
    }
    Ok(url)
}

/// Validate that the secret key meets minimum length requirements.
fn validate_secret_key(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SECRET_KEY_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SECRET_KEY_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let err = validate_secret_strength("changeme-grocery-key", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("abababababababababababababababab", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_secret_key_length() {
        assert!(validate_secret_key(&SecretString::from("short"), "K").is_err());
        assert!(validate_secret_key(&SecretString::from("k".repeat(32)), "K").is_ok());
    }

    #[test]
    fn test_parse_base_url() {
        let url = parse_base_url("K", "https://grocery.example.org").unwrap();
        assert_eq!(url.host_str(), Some("grocery.example.org"));

        assert!(parse_base_url("K", "not a url").is_err());
        assert!(parse_base_url("K", "ftp://files.example.org").is_err());
    }

    #[test]
    fn test_smtp_config_debug_redacts_password() {
        let smtp = SmtpConfig {
            host: "smtp.mail.test".to_string(),
            port: 587,
            username: Some("mailer".to_string()),
            password: Some(SecretString::from("hunter2-but-longer")),
            starttls: true,
        };

        let debug_output = format!("{smtp:?}");
        assert!(debug_output.contains("smtp.mail.test"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("hunter2-but-longer"));
    }
}
