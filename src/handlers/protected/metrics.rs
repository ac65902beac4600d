// handlers/protected/metrics.rs - GET /debug/vars handler

use axum::extract::State;
use serde::Serialize;

use crate::database::PoolStats;
use crate::middleware::{ApiResponse, ApiResult, MetricsSnapshot};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct DebugVars {
    #[serde(flatten)]
    pub requests: MetricsSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PoolStats>,
    pub background_tasks: usize,
}

/// GET /debug/vars - request counters, pool occupancy and pending background
/// tasks for this process (requires `metrics:view`).
pub async fn debug_vars_get(State(state): State<AppState>) -> ApiResult<DebugVars> {
    Ok(ApiResponse::success(DebugVars {
        requests: state.metrics.snapshot(),
        database: state.store.pool_stats(),
        background_tasks: state.background.len(),
    }))
}
