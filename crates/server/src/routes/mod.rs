//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                              - Liveness check
//! GET    /health/ready                        - Readiness check (repository ping)
//!
//! # Accounts
//! POST   /users                               - Register
//! GET    /users/me                            - Own profile
//! PATCH  /users/me                            - Change username
//! PATCH  /users/me/change-password            - Change password
//!
//! # Auth
//! GET    /login                               - 400, login is POST only
//! POST   /login                               - Log in (?remember_me, ?next)
//! GET    /logout                              - Log out
//!
//! # Households
//! POST   /households                          - Create
//! GET    /households/profile                  - Profile (member)
//! PATCH  /households/profile/name             - Rename (admin)
//! POST   /households/join                     - Join with password
//! DELETE /households/members/{user_id}        - Remove member (admin)
//! PATCH  /households/admins/{user_id}         - Promote to admin (admin)
//! POST   /households/shopping_list/items      - Add item (member)
//! GET    /households/shopping_list/items      - List items (member)
//!
//! # Email confirmation
//! GET    /resend_email_confirmation           - Mail a confirmation link
//! GET    /confirm_email/{token}               - Confirm the address
//! ```

pub mod auth;
pub mod emails;
pub mod households;
pub mod shopping_list;
pub mod users;

use axum::{
    Json, Router,
    extract::{Request, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use tower_sessions::SessionStore;

use crate::middleware::{
    auth_rate_limiter, create_session_layer, request_id_middleware, security_headers_middleware,
};
use crate::state::AppState;

/// `{"message": msg}`
pub(crate) fn message(msg: &str) -> Json<Value> {
    Json(json!({ "message": msg }))
}

/// Routes that take credentials; rate limited per client IP when enabled.
fn credential_routes(rate_limited: bool) -> Router<AppState> {
    let router = Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/users", post(users::create_user));

    if rate_limited {
        router.layer(auth_rate_limiter())
    } else {
        router
    }
}

/// Create the household routes router.
fn household_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(households::create))
        .route("/profile", get(households::profile))
        .route("/profile/name", patch(households::rename))
        .route("/join", post(households::join))
        .route("/members/{user_id}", delete(households::remove_member))
        .route("/admins/{user_id}", patch(households::promote_admin))
        .route(
            "/shopping_list/items",
            get(shopping_list::list_items).post(shopping_list::add_item),
        )
}

/// Create all application routes.
pub fn routes(rate_limited: bool) -> Router<AppState> {
    Router::new()
        .merge(credential_routes(rate_limited))
        .route("/users/me", get(users::me).patch(users::update_me))
        .route("/users/me/change-password", patch(users::change_password))
        .route("/logout", get(auth::logout))
        .nest("/households", household_routes())
        .route("/resend_email_confirmation", get(emails::resend_confirmation))
        .route("/confirm_email/{token}", get(emails::confirm))
}

/// Build the complete application: routes, sessions and the middleware stack.
///
/// The session store is a parameter so tests can run on `MemoryStore`.
pub fn app<S>(state: AppState, store: S) -> Router
where
    S: SessionStore + Clone,
{
    let session_layer = create_session_layer(store, state.config());
    let rate_limited = state.config().auth_rate_limit;

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes(rate_limited))
        .fallback(not_found)
        .layer(session_layer)
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the repository is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.repo().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
