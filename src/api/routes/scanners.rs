use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use crate::api::models::{CategoryIdsRequest, LevelUpdate, ScannerIdsRequest, ScannerInfo, ScannersQuery};
use crate::api::AppState;
use crate::errors::ScanError;
use crate::policy::{AlertThreshold, Category, PluginId};
use tracing::{info, warn};

pub async fn list_scanners(
    State(state): State<AppState>,
    Query(query): Query<ScannersQuery>,
) -> Result<Json<Value>, ScanError> {
    let policy = match query.policy.as_deref() {
        Some(name) => state.policies.load(name)?,
        None => state.scan_policy.read().await.clone(),
    };
    let category = match query.category {
        Some(id) => Some(
            Category::from_id(id).ok_or_else(|| ScanError::InvalidRequest(format!("Unknown category id: {}", id)))?,
        ),
        None => None,
    };

    let scanners: Vec<ScannerInfo> = policy
        .catalog()
        .all()
        .filter(|definition| category.is_none_or(|c| definition.category == c))
        .map(|definition| ScannerInfo::from_policy(definition, &policy))
        .collect();
    Ok(Json(json!({ "policy": policy.name(), "scanners": scanners })))
}

pub async fn enable_scanners(
    State(state): State<AppState>,
    Json(req): Json<ScannerIdsRequest>,
) -> Result<Json<Value>, ScanError> {
    let mut current = state.scan_policy.write().await;
    let mut policy = current.clone();
    let mut enabled = Vec::new();
    let mut blocked = Vec::new();
    let mut unknown = Vec::new();

    match req.ids {
        None => {
            blocked = policy.enable_all();
            enabled = policy.enabled_modules();
        }
        Some(ids) => {
            for id in ids {
                match policy.set_module_enabled(id, true) {
                    Ok(true) => enabled.push(id),
                    Ok(false) => blocked.push(id),
                    Err(e) => {
                        warn!(plugin_id = id, error = %e, "Skipping scanner");
                        unknown.push(id);
                    }
                }
            }
        }
    }

    state.commit_policy(&policy).await?;
    *current = policy;
    info!(enabled = enabled.len(), blocked = blocked.len(), "Scanners enabled");
    Ok(Json(json!({ "enabled": enabled, "blocked": blocked, "unknown": unknown })))
}

pub async fn disable_scanners(
    State(state): State<AppState>,
    Json(req): Json<ScannerIdsRequest>,
) -> Result<Json<Value>, ScanError> {
    let mut current = state.scan_policy.write().await;
    let mut policy = current.clone();
    let mut disabled: Vec<PluginId> = Vec::new();
    let mut unknown = Vec::new();

    match req.ids {
        None => {
            policy.disable_all();
            disabled = policy.modules().map(|(id, _)| id).collect();
        }
        Some(ids) => {
            for id in ids {
                match policy.set_module_enabled(id, false) {
                    Ok(_) => disabled.push(id),
                    Err(e) => {
                        warn!(plugin_id = id, error = %e, "Skipping scanner");
                        unknown.push(id);
                    }
                }
            }
        }
    }

    state.commit_policy(&policy).await?;
    *current = policy;
    info!(disabled = disabled.len(), "Scanners disabled");
    Ok(Json(json!({ "disabled": disabled, "unknown": unknown })))
}

/// Enable exactly the listed categories and switch every other one off.
pub async fn set_enabled_categories(
    State(state): State<AppState>,
    Json(req): Json<CategoryIdsRequest>,
) -> Result<Json<Value>, ScanError> {
    let mut unknown = Vec::new();
    for id in &req.ids {
        if Category::from_id(*id).is_none() {
            warn!(category_id = *id, "Skipping unknown category");
            unknown.push(*id);
        }
    }

    let mut current = state.scan_policy.write().await;
    let mut policy = current.clone();
    let threshold = policy.fallback_threshold();
    let mut blocked = Vec::new();
    for category in Category::ALL {
        if req.ids.contains(&category.id()) {
            blocked.extend(policy.set_category_threshold(category, threshold));
        } else {
            policy.set_category_threshold(category, AlertThreshold::Off);
        }
    }

    state.commit_policy(&policy).await?;
    *current = policy;
    Ok(Json(json!({ "enabled_categories": req.ids, "blocked": blocked, "unknown": unknown })))
}

pub async fn update_scanner(
    State(state): State<AppState>,
    Path(id): Path<PluginId>,
    Json(update): Json<LevelUpdate>,
) -> Result<Json<Value>, ScanError> {
    let threshold = update.threshold()?;
    let strength = update.strength()?;

    let mut current = state.scan_policy.write().await;
    let mut policy = current.clone();
    let definition = policy.catalog().get(id).cloned().ok_or(ScanError::ScannerNotFound(id))?;
    if let Some(threshold) = threshold {
        policy.set_module_threshold(id, threshold)?;
    }
    if let Some(strength) = strength {
        policy.set_module_strength(id, strength)?;
    }

    state.commit_policy(&policy).await?;
    let info = ScannerInfo::from_policy(&definition, &policy);
    *current = policy;
    Ok(Json(json!(info)))
}
