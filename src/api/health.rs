//! Health check endpoint

use axum::response::IntoResponse;

/// Liveness probe used by `--healthcheck` and container orchestrators
pub async fn healthz() -> impl IntoResponse {
    "ok"
}
