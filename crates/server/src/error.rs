//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//! Every error body has the shape `{"error": "<message>"}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use grocery_squad_core::MembershipError;

use crate::db::RepositoryError;
use crate::services::{
    AuthError, ConfirmationError, EmailError, HouseholdError, ShoppingListError, TokenError,
};

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),

    /// A unique name or address is already in use.
    #[error("{0}")]
    Conflict(String),

    /// Unknown username or wrong password at login.
    #[error("Incorrect username or password")]
    InvalidCredentials,

    /// A shared secret other than the login password was wrong.
    #[error("{0}")]
    Unauthorized(String),

    /// No session, or the session's account is gone.
    #[error("Please login before accessing this resource.")]
    Unauthenticated,

    /// A household membership rule refused the request.
    #[error(transparent)]
    Membership(#[from] MembershipError),

    /// Confirmation token failed verification.
    #[error("The confirmation link is invalid or has expired")]
    Token(#[from] TokenError),

    /// Referenced entity absent.
    #[error("{0}")]
    NotFound(String),

    /// Mail could not be sent.
    #[error("Unable to send the confirmation email")]
    Email(#[source] EmailError),

    /// A valid confirmation token names an address no account owns.
    #[error("No account matches this confirmation link")]
    AccountGone,

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Status code sent for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::Conflict(_)
            | Self::Token(_)
            | Self::NotFound(_)
            | Self::Email(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials | Self::Unauthorized(_) | Self::Unauthenticated => {
                StatusCode::UNAUTHORIZED
            }
            Self::Membership(err) => match err {
                MembershipError::NotAnAdmin
                | MembershipError::TargetAlreadyAdmin
                | MembershipError::TargetIsAdmin => StatusCode::UNAUTHORIZED,
                MembershipError::NoHousehold
                | MembershipError::HouseholdMissing
                | MembershipError::NotAMember { .. }
                | MembershipError::AlreadyMember
                | MembershipError::InAnotherHousehold
                | MembershipError::TargetNotMember => StatusCode::BAD_REQUEST,
            },
            Self::AccountGone | Self::Database(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(
            self,
            Self::Database(_) | Self::Internal(_) | Self::AccountGone
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::UsernameTaken | AuthError::EmailTaken => Self::Conflict(err.to_string()),
            AuthError::InvalidCredentials => Self::InvalidCredentials,
            AuthError::AccountNotFound => Self::Unauthenticated,
            AuthError::PasswordHash => Self::Internal(err.to_string()),
            AuthError::Repository(e) => Self::Database(e),
            AuthError::Missing(_)
            | AuthError::InvalidName(_)
            | AuthError::InvalidEmail(_)
            | AuthError::WeakPassword
            | AuthError::IncorrectPassword
            | AuthError::PasswordMismatch => Self::Validation(err.to_string()),
        }
    }
}

impl From<HouseholdError> for AppError {
    fn from(err: HouseholdError) -> Self {
        match err {
            HouseholdError::NameTaken => Self::Conflict(err.to_string()),
            HouseholdError::NotFound => Self::NotFound(err.to_string()),
            HouseholdError::IncorrectPassword => Self::Unauthorized(err.to_string()),
            HouseholdError::Membership(e) => Self::Membership(e),
            HouseholdError::AccountNotFound => Self::Unauthenticated,
            HouseholdError::PasswordHash => Self::Internal(err.to_string()),
            HouseholdError::Repository(e) => Self::Database(e),
            HouseholdError::Missing(_)
            | HouseholdError::InvalidName(_)
            | HouseholdError::WeakPassword => Self::Validation(err.to_string()),
        }
    }
}

impl From<ShoppingListError> for AppError {
    fn from(err: ShoppingListError) -> Self {
        match err {
            ShoppingListError::Repository(e) => Self::Database(e),
            ShoppingListError::MissingItemName | ShoppingListError::InvalidName(_) => {
                Self::Validation(err.to_string())
            }
        }
    }
}

impl From<ConfirmationError> for AppError {
    fn from(err: ConfirmationError) -> Self {
        match err {
            ConfirmationError::AlreadyConfirmed => Self::Validation(err.to_string()),
            ConfirmationError::Send(e) => Self::Email(e),
            ConfirmationError::Token(e) => Self::Token(e),
            ConfirmationError::AccountGone(email) => {
                tracing::error!(email = %email, "Confirmation token names a missing account");
                Self::AccountGone
            }
            ConfirmationError::Repository(e) => Self::Database(e),
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, username: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            username: username.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("household", "Joined household", Some(&[("household_id", "7")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap_or_default();
        (status, serde_json::from_slice(&bytes).unwrap_or_default())
    }

    #[test]
    fn test_membership_status_codes() {
        let status = |e| AppError::Membership(e).status();

        assert_eq!(status(MembershipError::NoHousehold), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(MembershipError::NotAMember {
                household: "Rikkai".to_string()
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status(MembershipError::AlreadyMember), StatusCode::BAD_REQUEST);
        assert_eq!(status(MembershipError::TargetNotMember), StatusCode::BAD_REQUEST);
        assert_eq!(status(MembershipError::NotAnAdmin), StatusCode::UNAUTHORIZED);
        assert_eq!(status(MembershipError::TargetAlreadyAdmin), StatusCode::UNAUTHORIZED);
        assert_eq!(status(MembershipError::TargetIsAdmin), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_service_error_mapping() {
        assert_eq!(
            AppError::from(AuthError::UsernameTaken).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(AuthError::InvalidCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::from(HouseholdError::IncorrectPassword).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::from(HouseholdError::NotFound).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(ConfirmationError::Token(TokenError::Expired)).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let (status, body) = body_of(AppError::from(AuthError::UsernameTaken)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "The username is already taken");

        let (status, body) = body_of(AppError::Unauthenticated).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Please login before accessing this resource.");
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let (status, body) = body_of(AppError::Database(RepositoryError::DataCorruption(
            "household 7 has bad name".to_string(),
        )))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }
}
