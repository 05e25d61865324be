use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use crate::api::models::{CategoryInfo, LevelUpdate};
use crate::api::AppState;
use crate::errors::ScanError;
use crate::policy::{Category, PluginId, Policy};

fn describe(policy: &Policy) -> Value {
    json!({
        "name": policy.name(),
        "threshold": policy.default_threshold(),
        "strength": policy.default_strength(),
        "enabled_scanners": policy.enabled_modules().len(),
        "categories": CategoryInfo::for_policy(policy),
    })
}

pub async fn list_policies(State(state): State<AppState>) -> Result<Json<Value>, ScanError> {
    let names = state.policies.list_names()?;
    let scan_policy = state.scan_policy.read().await.name().to_string();
    Ok(Json(json!({
        "policies": names,
        "scan_policy": scan_policy,
        "attack_policy": state.attack.policy_name(),
    })))
}

pub async fn get_policy(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ScanError> {
    {
        let current = state.scan_policy.read().await;
        if current.name() == name {
            return Ok(Json(describe(&current)));
        }
    }
    let policy = state.policies.load(&name)?;
    Ok(Json(describe(&policy)))
}

/// Set threshold and/or strength for one category of a stored policy.
pub async fn update_category(
    State(state): State<AppState>,
    Path((name, category_id)): Path<(String, u8)>,
    Json(update): Json<LevelUpdate>,
) -> Result<Json<Value>, ScanError> {
    let category = Category::from_id(category_id)
        .ok_or_else(|| ScanError::InvalidRequest(format!("Unknown category id: {}", category_id)))?;
    let threshold = update.threshold()?;
    let strength = update.strength()?;

    let apply = |policy: &mut Policy| -> Vec<PluginId> {
        let skipped = match threshold {
            Some(threshold) => policy.set_category_threshold(category, threshold),
            None => Vec::new(),
        };
        if let Some(strength) = strength {
            policy.set_category_strength(category, strength);
        }
        skipped
    };

    // Hold the shared policy's lock only when that is the one being edited.
    let current = state.scan_policy.write().await;
    let mut shared = (current.name() == name).then_some(current);
    let mut policy = match &shared {
        Some(current) => (**current).clone(),
        None => state.policies.load(&name)?,
    };
    let skipped = apply(&mut policy);
    state.commit_policy(&policy).await?;
    if let Some(current) = shared.as_mut() {
        **current = policy.clone();
    }

    Ok(Json(json!({
        "category": category,
        "threshold": policy.category_threshold(category),
        "strength": policy.category_strength(category),
        "skipped": skipped,
    })))
}
