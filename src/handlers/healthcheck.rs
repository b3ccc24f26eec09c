use axum::extract::State;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::middleware::ApiResponse;

/// GET /v1/healthcheck
pub async fn show(State(state): State<AppState>) -> ApiResponse<Value> {
    ApiResponse::success(json!({
        "status": "available",
        "environment": state.config.environment.as_str(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
