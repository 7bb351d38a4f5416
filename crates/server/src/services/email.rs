//! Email service for account confirmation mail.
//!
//! Uses SMTP via lettre for delivery with Askama templates. Without an SMTP
//! relay configured, messages are written to the log instead of sent.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use grocery_squad_core::Email;

use crate::config::{AppConfig, SmtpConfig};

/// HTML template for the confirmation email.
#[derive(Template)]
#[template(path = "email/confirm_email.html")]
struct ConfirmEmailHtml<'a> {
    username: Option<&'a str>,
    link: &'a str,
    valid_minutes: u64,
}

/// Plain text template for the confirmation email.
#[derive(Template)]
#[template(path = "email/confirm_email.txt")]
struct ConfirmEmailText<'a> {
    username: Option<&'a str>,
    link: &'a str,
    valid_minutes: u64,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

#[derive(Clone)]
enum Mailer {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    Log,
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: Mailer,
    from_address: String,
    base_url: String,
}

impl std::fmt::Debug for EmailService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mailer = match self.mailer {
            Mailer::Smtp(_) => "smtp",
            Mailer::Log => "log",
        };
        f.debug_struct("EmailService")
            .field("mailer", &mailer)
            .field("from_address", &self.from_address)
            .finish_non_exhaustive()
    }
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay host is unusable.
    pub fn new(config: &AppConfig) -> Result<Self, SmtpError> {
        let mailer = match &config.smtp {
            Some(smtp) => Mailer::Smtp(smtp_transport(smtp)?),
            None => {
                tracing::warn!("SMTP_HOST not set, confirmation emails will only be logged");
                Mailer::Log
            }
        };

        Ok(Self {
            mailer,
            from_address: config.mail_from.clone(),
            base_url: config.base_url.as_str().trim_end_matches('/').to_owned(),
        })
    }

    /// Absolute link that confirms the address a token was issued for.
    #[must_use]
    pub fn confirmation_link(&self, token: &str) -> String {
        format!("{}/confirm_email/{token}", self.base_url)
    }

    /// Send the confirmation email.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_confirmation(
        &self,
        to: &Email,
        username: Option<&str>,
        token: &str,
        valid_minutes: u64,
    ) -> Result<(), EmailError> {
        let link = self.confirmation_link(token);
        let html = ConfirmEmailHtml {
            username,
            link: &link,
            valid_minutes,
        }
        .render()?;
        let text = ConfirmEmailText {
            username,
            link: &link,
            valid_minutes,
        }
        .render()?;

        self.send_multipart_email(to.as_str(), "Confirm Email", &text, &html)
            .await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let from: Mailbox = self
            .from_address
            .parse()
            .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?;
        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|_| EmailError::InvalidAddress(to.to_string()))?;

        let email = Message::builder()
            .from(from)
            .to(to_mailbox)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        match &self.mailer {
            Mailer::Smtp(transport) => {
                transport.send(email).await?;
                tracing::info!(to = %to, subject = %subject, "Email sent successfully");
            }
            Mailer::Log => {
                tracing::info!(to = %to, subject = %subject, body = %text_body, "Email not sent (no SMTP relay)");
            }
        }
        Ok(())
    }
}

fn smtp_transport(config: &SmtpConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>, SmtpError> {
    let mut builder = if config.starttls {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
    }
    .port(config.port);

    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        builder = builder.credentials(Credentials::new(
            username.clone(),
            password.expose_secret().to_string(),
        ));
    }

    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_render_link() {
        let link = "https://squad.test/confirm_email/abc.def.ghi";
        let html = ConfirmEmailHtml {
            username: Some("abacus"),
            link,
            valid_minutes: 60,
        }
        .render()
        .unwrap_or_default();
        let text = ConfirmEmailText {
            username: None,
            link,
            valid_minutes: 60,
        }
        .render()
        .unwrap_or_default();

        assert!(html.contains("href=\"https://squad.test/confirm_email/abc.def.ghi\""));
        assert!(html.contains("abacus"));
        assert!(text.contains(link));
        assert!(text.contains("60 minutes"));
    }
}
