pub mod routes;
pub mod models;
pub mod errors;

use std::sync::Arc;
use axum::routing::{get, post, put};
use axum::Router;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use crate::attack::AttackModeScheduler;
use crate::controller::ScanController;
use crate::errors::ScanError;
use crate::policy::{Policy, PolicyManager};
use crate::topology::MemorySiteTree;

/// Everything the HTTP handlers share.
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<ScanController>,
    pub policies: Arc<PolicyManager>,
    /// Policy handed to new scans unless a request names another one.
    pub scan_policy: Arc<RwLock<Policy>>,
    pub attack: Arc<AttackModeScheduler>,
    pub tree: Arc<MemorySiteTree>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        controller: Arc<ScanController>,
        policies: Arc<PolicyManager>,
        attack: Arc<AttackModeScheduler>,
        tree: Arc<MemorySiteTree>,
    ) -> Self {
        let scan_policy = policies.resolve_default();
        Self {
            controller,
            policies,
            scan_policy: Arc::new(RwLock::new(scan_policy)),
            attack,
            tree,
            started_at: Utc::now(),
        }
    }

    /// Write an edited policy to the store, then hand it to attack mode when
    /// both use the same policy. Callers update their in-memory copy only
    /// after this succeeds.
    pub async fn commit_policy(&self, policy: &Policy) -> Result<(), ScanError> {
        let policies = self.policies.clone();
        let snapshot = policy.clone();
        tokio::task::spawn_blocking(move || policies.save(&snapshot))
            .await
            .map_err(|e| ScanError::Internal(format!("Policy write task failed: {}", e)))??;
        if self.attack.policy_name() == policy.name() {
            self.attack.set_policy(policy.clone());
        }
        Ok(())
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(routes::health::health_check))
        .route("/api/scan", post(routes::scans::legacy_scan))
        .route("/api/status", get(routes::scans::legacy_status))
        .route(
            "/api/scans",
            post(routes::scans::create_scan)
                .get(routes::scans::list_scans)
                .delete(routes::scans::remove_all_scans),
        )
        .route("/api/scans/pause-all", post(routes::scans::pause_all))
        .route("/api/scans/resume-all", post(routes::scans::resume_all))
        .route("/api/scans/stop-all", post(routes::scans::stop_all))
        .route("/api/scans/{id}", get(routes::scans::get_scan).delete(routes::scans::remove_scan))
        .route("/api/scans/{id}/pause", post(routes::scans::pause_scan))
        .route("/api/scans/{id}/resume", post(routes::scans::resume_scan))
        .route("/api/scans/{id}/stop", post(routes::scans::stop_scan))
        .route(
            "/api/exclusions",
            get(routes::scans::list_exclusions)
                .post(routes::scans::add_exclusion)
                .delete(routes::scans::clear_exclusions),
        )
        .route("/api/scanners", get(routes::scanners::list_scanners))
        .route("/api/scanners/enable", post(routes::scanners::enable_scanners))
        .route("/api/scanners/disable", post(routes::scanners::disable_scanners))
        .route("/api/scanners/categories", post(routes::scanners::set_enabled_categories))
        .route("/api/scanners/{id}", put(routes::scanners::update_scanner))
        .route("/api/policies", get(routes::policies::list_policies))
        .route("/api/policies/{name}", get(routes::policies::get_policy))
        .route("/api/policies/{name}/categories/{category}", put(routes::policies::update_category))
        .route("/api/attack", get(routes::attack::attack_status))
        .route("/api/attack/start", post(routes::attack::start_attack))
        .route("/api/attack/stop", post(routes::attack::stop_attack))
        .route("/api/sites", post(routes::attack::add_site))
        .route("/api/scope", post(routes::attack::include_in_scope).delete(routes::attack::clear_scope))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
