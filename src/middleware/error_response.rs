//! Error response normalization middleware
//!
//! Framework-level rejections (unknown route, wrong method) come back as
//! text/plain. Mandrill clients expect a JSON error body on every failure,
//! so those responses are rewritten into the same shape `AppError` produces.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

pub async fn normalize_error_response(request: Request<Body>, next: Next) -> Response {
    let response = next.run(request).await;
    let status = response.status();

    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));
    if is_json {
        return response;
    }

    generic_error_response(status)
}

fn generic_error_response(status: StatusCode) -> Response {
    let (name, message) = match status {
        StatusCode::NOT_FOUND => ("Unknown_Method", "not found"),
        StatusCode::METHOD_NOT_ALLOWED => ("Unknown_Method", "method not allowed"),
        StatusCode::PAYLOAD_TOO_LARGE => ("ValidationError", "request body too large"),
        _ if status.is_client_error() => ("ValidationError", "bad request"),
        _ => ("GeneralError", "An internal error occurred"),
    };

    let body = json!({
        "status": "error",
        "error": message,
        "name": name,
    });

    (status, axum::Json(body)).into_response()
}
