//! JSON body extractor with uniform error responses.
//!
//! axum's `Json` rejects with plain-text bodies and its own status codes.
//! `ApiJson` answers every body problem with a 400 `{"error": ...}` and
//! treats an absent or empty object the same way, with a per-endpoint message.

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// A request body type accepted by [`ApiJson`].
pub trait JsonBody: DeserializeOwned {
    /// Message returned when the body is missing, `null` or `{}`.
    const EMPTY: &'static str = "No data provided";
}

/// Extract and deserialize a JSON request body.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: JsonBody,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;

        if is_empty_body(&bytes) {
            return Err(AppError::Validation(T::EMPTY.to_string()));
        }

        serde_json::from_slice(&bytes)
            .map(ApiJson)
            .map_err(|e| AppError::Validation(format!("Invalid request body: {e}")))
    }
}

fn is_empty_body(bytes: &[u8]) -> bool {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return true;
    }
    match serde_json::from_slice::<serde_json::Value>(bytes) {
        Ok(serde_json::Value::Null) => true,
        Ok(serde_json::Value::Object(map)) => map.is_empty(),
        _ => false,
    }
}
