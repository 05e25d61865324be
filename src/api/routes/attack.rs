use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use crate::api::models::{RegexRequest, UrlRequest};
use crate::api::AppState;
use crate::errors::ScanError;

fn attack_json(state: &AppState) -> Value {
    json!({
        "state": state.attack.state(),
        "active": state.attack.is_active(),
        "queued": state.attack.queue_len(),
        "workers": state.attack.active_workers(),
        "pool_size": state.attack.pool_size(),
        "policy": state.attack.policy_name(),
    })
}

pub async fn attack_status(State(state): State<AppState>) -> Json<Value> {
    Json(attack_json(&state))
}

pub async fn start_attack(State(state): State<AppState>) -> Json<Value> {
    state.attack.start().await;
    Json(attack_json(&state))
}

pub async fn stop_attack(State(state): State<AppState>) -> Json<Value> {
    state.attack.stop().await;
    Json(attack_json(&state))
}

/// Record a URL in the site tree, as a proxy or spider would.
pub async fn add_site(
    State(state): State<AppState>,
    Json(req): Json<UrlRequest>,
) -> Result<(StatusCode, Json<Value>), ScanError> {
    let node = state.tree.add_url(&req.url)?;
    Ok((StatusCode::CREATED, Json(json!(node))))
}

pub async fn include_in_scope(
    State(state): State<AppState>,
    Json(req): Json<RegexRequest>,
) -> Result<Json<Value>, ScanError> {
    state.tree.include_in_scope(&req.regex)?;
    state.attack.scope_changed().await;
    Ok(Json(json!({ "included": req.regex })))
}

pub async fn clear_scope(State(state): State<AppState>) -> Json<Value> {
    state.tree.clear_scope();
    state.attack.scope_changed().await;
    Json(json!({ "cleared": true }))
}
