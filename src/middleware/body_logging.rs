//! Request and response body logging for debug mode
//!
//! Bodies are buffered, logged at debug level and handed on unchanged.
//! Logged text is cut at [`MAX_LOGGED_BODY`] bytes.

use axum::{
    body::{to_bytes, Body, Bytes},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

pub const MAX_LOGGED_BODY: usize = 100 * 1024;

/// Upper bound for buffering a body at all; larger bodies fail the request
const MAX_BUFFERED_BODY: usize = 32 * 1024 * 1024;

pub async fn log_bodies(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, MAX_BUFFERED_BODY).await {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to buffer request body");
            return axum::http::StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };
    tracing::debug!(%method, %path, body = %truncate_for_log(&bytes), "Request body");

    let response = next.run(Request::from_parts(parts, Body::from(bytes))).await;

    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_BUFFERED_BODY).await {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to buffer response body");
            Bytes::new()
        }
    };
    tracing::debug!(
        %method,
        %path,
        status = parts.status.as_u16(),
        body = %truncate_for_log(&bytes),
        "Response body"
    );

    Response::from_parts(parts, Body::from(bytes))
}

/// Lossy UTF-8 view of `bytes`, cut at [`MAX_LOGGED_BODY`]
pub fn truncate_for_log(bytes: &[u8]) -> String {
    if bytes.len() <= MAX_LOGGED_BODY {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    let mut out = String::from_utf8_lossy(&bytes[..MAX_LOGGED_BODY]).into_owned();
    out.push_str("... (truncated)");
    out
}
