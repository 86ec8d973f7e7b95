//! Liveness endpoint.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::AppState;

/// GET /v1/healthcheck - Public status report.
pub async fn healthcheck(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "available",
        "system_info": {
            "environment": state.config.env,
            "version": env!("CARGO_PKG_VERSION"),
        }
    }))
}
