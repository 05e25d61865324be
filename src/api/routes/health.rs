use axum::{extract::State, Json};
use serde_json::{json, Value};
use crate::api::AppState;
use crate::utils::format_duration;

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let uptime_ms = (chrono::Utc::now() - state.started_at).num_milliseconds().max(0) as u64;
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "build": {
            "timestamp": option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
            "git_hash": option_env!("GIT_HASH").unwrap_or("unknown"),
        },
        "uptime_ms": uptime_ms,
        "uptime": format_duration(uptime_ms),
        "scans": state.controller.count(),
        "attack_mode": state.attack.state(),
    }))
}
