use axum::{response::IntoResponse, Json};
use serde_json::json;

/// Claims-independent liveness probe. Cannot fail and requires no auth.
pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "Ok!" }))
}
