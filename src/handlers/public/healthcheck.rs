// handlers/public/healthcheck.rs - GET /v1/healthcheck handler

use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::AppState;

/// GET /v1/healthcheck - report availability, environment and version.
///
/// Answers 503 when the store does not respond to a ping.
pub async fn healthcheck_get(State(state): State<AppState>) -> Response {
    if let Err(e) = state.store.ping().await {
        tracing::warn!("health check failed: {}", e);
        return ApiError::service_unavailable("the store is not reachable").into_response();
    }

    ApiResponse::success(json!({
        "status": "available",
        "system_info": {
            "environment": state.config.environment,
            "version": env!("CARGO_PKG_VERSION"),
        }
    }))
    .into_response()
}
