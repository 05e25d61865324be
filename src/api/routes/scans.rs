use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use crate::api::models::{CreateScanRequest, RegexRequest};
use crate::api::AppState;
use crate::controller::{JobId, ScanRequest};
use crate::errors::ScanError;

async fn build_request(state: &AppState, req: CreateScanRequest) -> Result<ScanRequest, ScanError> {
    let policy = match req.policy.as_deref() {
        Some(name) => state.policies.load(name)?,
        None => state.scan_policy.read().await.clone(),
    };
    Ok(ScanRequest::new(req.url, policy)
        .with_recurse(req.recurse.unwrap_or(true))
        .with_in_scope_only(req.in_scope_only.unwrap_or(false)))
}

pub async fn create_scan(
    State(state): State<AppState>,
    Json(req): Json<CreateScanRequest>,
) -> Result<(StatusCode, Json<Value>), ScanError> {
    let request = build_request(&state, req).await?;
    let id = state.controller.create_and_start(request)?;
    let job = state.controller.get(id).ok_or(ScanError::JobNotFound(id))?;
    Ok((StatusCode::CREATED, Json(json!(job.summary()))))
}

/// Single-job `scan` command.
pub async fn legacy_scan(
    State(state): State<AppState>,
    Json(req): Json<CreateScanRequest>,
) -> Result<Json<Value>, ScanError> {
    let request = build_request(&state, req).await?;
    let id = state.controller.start_legacy_scan(request)?;
    Ok(Json(json!({ "scan": id })))
}

/// Progress of the most recent scan.
pub async fn legacy_status(State(state): State<AppState>) -> Json<Value> {
    match state.controller.most_recent() {
        Some(job) => Json(json!({
            "scan": job.id(),
            "status": job.progress(),
            "state": job.state(),
        })),
        None => Json(json!({ "scan": null, "status": 0 })),
    }
}

pub async fn list_scans(State(state): State<AppState>) -> Json<Value> {
    let scans: Vec<_> = state.controller.list_all().iter().map(|job| job.summary()).collect();
    Json(json!({ "total": scans.len(), "scans": scans }))
}

pub async fn get_scan(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> Result<Json<Value>, ScanError> {
    let job = state.controller.get(id).ok_or(ScanError::JobNotFound(id))?;
    Ok(Json(json!(job.summary())))
}

/// Removing an unknown id is not an error.
pub async fn remove_scan(State(state): State<AppState>, Path(id): Path<JobId>) -> Json<Value> {
    let removed = state.controller.remove(id).is_some();
    Json(json!({ "removed": removed }))
}

pub async fn remove_all_scans(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "removed": state.controller.remove_all() }))
}

pub async fn pause_scan(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> Result<Json<Value>, ScanError> {
    state.controller.pause(id)?;
    Ok(Json(json!({ "paused": true })))
}

pub async fn resume_scan(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> Result<Json<Value>, ScanError> {
    state.controller.resume(id)?;
    Ok(Json(json!({ "resumed": true })))
}

pub async fn stop_scan(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> Result<Json<Value>, ScanError> {
    state.controller.stop(id)?;
    Ok(Json(json!({ "stopped": true })))
}

pub async fn pause_all(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "paused": state.controller.pause_all() }))
}

pub async fn resume_all(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "resumed": state.controller.resume_all() }))
}

pub async fn stop_all(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "stopped": state.controller.stop_all() }))
}

pub async fn list_exclusions(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "excluded": state.controller.options().exclusion_patterns() }))
}

pub async fn add_exclusion(
    State(state): State<AppState>,
    Json(req): Json<RegexRequest>,
) -> Result<Json<Value>, ScanError> {
    let options = state.controller.options();
    options.exclude(&req.regex)?;
    Ok(Json(json!({ "excluded": options.exclusion_patterns() })))
}

pub async fn clear_exclusions(State(state): State<AppState>) -> Json<Value> {
    state.controller.options().clear_exclusions();
    Json(json!({ "excluded": [] }))
}
