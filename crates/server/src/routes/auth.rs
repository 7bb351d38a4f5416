//! Authentication route handlers.
//!
//! Password login establishes a server-side session; logout flushes it.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use serde_json::Value;
use tower_sessions::{Expiry, Session, cookie::time::Duration};
use url::Url;

use super::message;
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::extract::{ApiJson, JsonBody};
use crate::middleware::{RequireAuth, current_user, set_current_user};
use crate::models::CurrentUser;
use crate::services::AuthService;
use crate::state::AppState;

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl JsonBody for LoginRequest {
    const EMPTY: &'static str = "No user data provided";
}

/// Query parameters accepted by `POST /login`.
#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    /// Keep the session across browser restarts.
    pub remember_me: Option<String>,
    /// Where to send the client after logging in.
    pub next: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /login
pub async fn login_page() -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        message("Use POST request for login endpoint"),
    )
}

/// Log in with username and password.
///
/// POST /login?remember_me=1&next=/households/profile
///
/// An already logged-in session short-circuits before the body is looked at.
///
/// # Errors
///
/// 400 for a missing body or fields, 401 for bad credentials.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<LoginQuery>,
    body: std::result::Result<ApiJson<LoginRequest>, AppError>,
) -> Result<Response> {
    if current_user(&session).await.is_some() {
        return Ok(message("Already logged in.").into_response());
    }

    let ApiJson(req) = body?;
    let account = AuthService::new(state.repo())
        .login(req.username.as_deref(), req.password.as_deref())
        .await?;

    // New id on privilege change (session fixation)
    session.cycle_id().await.map_err(session_error)?;
    let user = CurrentUser {
        id: account.id,
        username: account.username,
    };
    set_current_user(&session, &user)
        .await
        .map_err(session_error)?;

    let remember = is_truthy(query.remember_me.as_deref());
    if remember {
        session.set_expiry(Some(Expiry::OnInactivity(Duration::days(
            state.config().remember_days,
        ))));
    }

    set_sentry_user(&user.id, Some(user.username.as_str()));
    tracing::info!(user_id = %user.id, remember, "User logged in");

    if let Some(target) = safe_redirect(&state.config().base_url, query.next.as_deref()) {
        return Ok(Redirect::to(&target).into_response());
    }
    Ok(message("Logged in successfully").into_response())
}

/// Log out.
///
/// GET /logout
///
/// # Errors
///
/// 401 without a session.
pub async fn logout(
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Value>> {
    session.flush().await.map_err(session_error)?;
    clear_sentry_user();

    tracing::info!(user_id = %user.id, "User logged out");
    Ok(message("Logged out successfully"))
}

// =============================================================================
// Helpers
// =============================================================================

fn session_error(err: tower_sessions::session::Error) -> AppError {
    AppError::Internal(format!("session error: {err}"))
}

/// Whether a query flag is switched on. Absent, empty and the usual
/// spellings of "no" are off.
fn is_truthy(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        let v = v.trim();
        !v.is_empty()
            && !["0", "false", "no", "off"]
                .iter()
                .any(|off| v.eq_ignore_ascii_case(off))
    })
}

/// The local path to redirect to, if `next` is a relative path.
///
/// Any hint with a scheme or a network location is dropped, even one naming
/// this service's own origin. Backslashes are refused since browsers treat
/// them as slashes.
fn safe_redirect(base: &Url, next: Option<&str>) -> Option<String> {
    let next = next.map(str::trim).filter(|n| !n.is_empty())?;
    if Url::parse(next).is_ok() || next.starts_with("//") || next.contains('\\') {
        tracing::warn!(next = %next, "Ignoring off-site login redirect");
        return None;
    }

    let target = base.join(next).ok()?;
    if target.origin() != base.origin() {
        tracing::warn!(next = %next, "Ignoring off-site login redirect");
        return None;
    }

    let mut path = target.path().to_owned();
    if let Some(query) = target.query() {
        path.push('?');
        path.push_str(query);
    }
    Some(path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://squad.example.org").unwrap()
    }

    #[test]
    fn test_is_truthy() {
        assert!(is_truthy(Some("1")));
        assert!(is_truthy(Some("true")));
        assert!(is_truthy(Some("yes")));
        assert!(!is_truthy(None));
        assert!(!is_truthy(Some("")));
        assert!(!is_truthy(Some("0")));
        assert!(!is_truthy(Some("False")));
        assert!(!is_truthy(Some("off")));
    }

    #[test]
    fn test_safe_redirect_accepts_local_paths() {
        assert_eq!(
            safe_redirect(&base(), Some("/households/profile")).as_deref(),
            Some("/households/profile")
        );
        assert_eq!(
            safe_redirect(&base(), Some("/users/me?tab=1")).as_deref(),
            Some("/users/me?tab=1")
        );
    }

    #[test]
    fn test_safe_redirect_rejects_network_locations() {
        for next in [
            "https://squad.example.org/users/me",
            "https://evil.example.com/",
            "//evil.example.com/path",
            "/\\evil.example.com",
            "http://squad.example.org/users/me",
            "https://squad.example.org:8443/",
            "javascript:alert(1)",
        ] {
            assert_eq!(safe_redirect(&base(), Some(next)), None, "{next}");
        }
        assert_eq!(safe_redirect(&base(), None), None);
        assert_eq!(safe_redirect(&base(), Some("  ")), None);
    }
}
