//! Mandrill-compatible REST handlers and shared extractors

pub mod health;
pub mod message;
pub mod template;

use crate::error::AppError;
use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;

/// JSON request body.
///
/// Mandrill clients do not always send a JSON content type, so the body is
/// decoded regardless of headers. Any decoding failure is reported as
/// `invalid json` without parser details.
#[derive(Debug, Clone)]
pub struct MandrillJson<T>(pub T);

impl<T, S> FromRequest<S> for MandrillJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|_| invalid_json())?;

        serde_json::from_slice(&bytes).map(MandrillJson).map_err(|e| {
            tracing::debug!(error = %e, "Rejecting malformed request body");
            invalid_json()
        })
    }
}

fn invalid_json() -> AppError {
    AppError::BadRequest("invalid json".to_string())
}

/// Check the request key against the configured keys.
/// An empty key list accepts any key.
pub(crate) fn require_key(api_keys: &[String], key: &str) -> crate::error::Result<()> {
    if api_keys.is_empty() || api_keys.iter().any(|k| k == key.trim()) {
        Ok(())
    } else {
        Err(AppError::Unauthorized("invalid mandrill api key".to_string()))
    }
}
