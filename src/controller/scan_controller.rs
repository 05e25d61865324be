use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use crate::engine::{Finding, ScanEngineFactory};
use crate::errors::ScanError;
use crate::policy::Policy;
use crate::topology::SiteTree;
use crate::utils::lock;
use super::job::{JobId, JobTarget, ScanJob};
use super::options::ScanOptions;
use tracing::{debug, info, warn};

/// Receives every finding raised by any job the controller owns.
pub trait FindingSink: Send + Sync {
    fn finding_raised(&self, job_id: JobId, finding: &Finding);
}

/// Sink that writes findings to the log.
pub struct LogFindingSink;

impl FindingSink for LogFindingSink {
    fn finding_raised(&self, job_id: JobId, finding: &Finding) {
        info!(
            job_id = job_id,
            plugin_id = finding.plugin_id,
            risk = ?finding.risk,
            url = %finding.url,
            "{}",
            finding.name
        );
    }
}

#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub url: String,
    pub recurse: bool,
    pub in_scope_only: bool,
    pub policy: Policy,
}

impl ScanRequest {
    pub fn new(url: impl Into<String>, policy: Policy) -> Self {
        Self {
            url: url.into(),
            recurse: true,
            in_scope_only: false,
            policy,
        }
    }

    pub fn with_recurse(mut self, recurse: bool) -> Self {
        self.recurse = recurse;
        self
    }

    pub fn with_in_scope_only(mut self, in_scope_only: bool) -> Self {
        self.in_scope_only = in_scope_only;
        self
    }
}

/// Id counter, job map and insertion order. Always mutated together.
#[derive(Default)]
struct Registry {
    next_id: JobId,
    jobs: HashMap<JobId, Arc<ScanJob>>,
    order: Vec<JobId>,
    legacy: Option<JobId>,
}

/// Registry and lifecycle manager for concurrently running scan jobs.
pub struct ScanController {
    tree: Arc<dyn SiteTree>,
    factory: Arc<dyn ScanEngineFactory>,
    options: Arc<ScanOptions>,
    sink: Option<Arc<dyn FindingSink>>,
    registry: Mutex<Registry>,
}

impl ScanController {
    pub fn new(
        tree: Arc<dyn SiteTree>,
        factory: Arc<dyn ScanEngineFactory>,
        options: Arc<ScanOptions>,
    ) -> Self {
        Self {
            tree,
            factory,
            options,
            sink: None,
            registry: Mutex::new(Registry::default()),
        }
    }

    pub fn with_finding_sink(mut self, sink: Arc<dyn FindingSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn options(&self) -> &Arc<ScanOptions> {
        &self.options
    }

    /// Create a job for `request.url` and start its engine.
    pub fn create_and_start(&self, request: ScanRequest) -> Result<JobId, ScanError> {
        let job = self.launch(request, false)?;
        Ok(job.id())
    }

    /// Single-job entry point used by the legacy `scan` command. Refuses to
    /// start while the previous legacy job is still running.
    pub fn start_legacy_scan(&self, request: ScanRequest) -> Result<JobId, ScanError> {
        let job = self.launch(request, true)?;
        Ok(job.id())
    }

    fn launch(&self, request: ScanRequest, legacy: bool) -> Result<Arc<ScanJob>, ScanError> {
        let node = self.tree.resolve(&request.url).ok_or_else(|| {
            if legacy {
                ScanError::UrlNotFound(request.url.clone())
            } else {
                ScanError::TargetNotFound(request.url.clone())
            }
        })?;
        let target = JobTarget {
            label: node.site.clone(),
            node: Some(node),
            recurse_children: request.recurse,
            scope_only: request.in_scope_only,
        };
        let exclusions = self.options.exclusions();

        let mut registry = lock(&self.registry);
        if legacy {
            if let Some(previous) = registry.legacy.and_then(|id| registry.jobs.get(&id)) {
                if !previous.is_stopped() {
                    return Err(ScanError::ScanAlreadyInProgress(previous.site().to_string()));
                }
            }
        }

        let id = registry.next_id;
        let job = Arc::new(ScanJob::new(id, target, request.policy, self.factory.as_ref(), exclusions));
        if let Some(sink) = &self.sink {
            let sink = sink.clone();
            job.on_finding(move |finding| sink.finding_raised(id, finding));
        }

        registry.next_id += 1;
        registry.jobs.insert(id, job.clone());
        registry.order.push(id);
        if legacy {
            registry.legacy = Some(id);
        }
        job.start()?;
        drop(registry);

        info!(
            job_id = id,
            target = %request.url,
            policy = %job.policy().name(),
            recurse = request.recurse,
            in_scope_only = request.in_scope_only,
            "Scan started"
        );
        Ok(job)
    }

    pub fn get(&self, id: JobId) -> Option<Arc<ScanJob>> {
        lock(&self.registry).jobs.get(&id).cloned()
    }

    fn require(&self, id: JobId) -> Result<Arc<ScanJob>, ScanError> {
        self.get(id).ok_or(ScanError::JobNotFound(id))
    }

    /// The last job created.
    pub fn most_recent(&self) -> Option<Arc<ScanJob>> {
        let registry = lock(&self.registry);
        registry.order.last().and_then(|id| registry.jobs.get(id)).cloned()
    }

    /// Every tracked job in creation order. A copy, not a live view.
    pub fn list_all(&self) -> Vec<Arc<ScanJob>> {
        let registry = lock(&self.registry);
        registry.order.iter().filter_map(|id| registry.jobs.get(id)).cloned().collect()
    }

    pub fn count(&self) -> usize {
        lock(&self.registry).jobs.len()
    }

    /// Stop and forget a job. Unknown ids return `None`.
    pub fn remove(&self, id: JobId) -> Option<Arc<ScanJob>> {
        let removed = {
            let mut registry = lock(&self.registry);
            let job = registry.jobs.remove(&id)?;
            registry.order.retain(|existing| *existing != id);
            if registry.legacy == Some(id) {
                registry.legacy = None;
            }
            job
        };
        stop_quietly(&removed);
        info!(job_id = id, "Scan removed");
        Some(removed)
    }

    /// Stop and forget every job. Returns how many were removed.
    pub fn remove_all(&self) -> usize {
        let removed: Vec<Arc<ScanJob>> = {
            let mut registry = lock(&self.registry);
            registry.legacy = None;
            let order = std::mem::take(&mut registry.order);
            let mut jobs = std::mem::take(&mut registry.jobs);
            order.into_iter().filter_map(|id| jobs.remove(&id)).collect()
        };
        for job in &removed {
            stop_quietly(job);
        }
        info!(count = removed.len(), "All scans removed");
        removed.len()
    }

    pub fn pause(&self, id: JobId) -> Result<(), ScanError> {
        self.require(id)?.pause()?;
        info!(job_id = id, "Scan paused");
        Ok(())
    }

    pub fn resume(&self, id: JobId) -> Result<(), ScanError> {
        self.require(id)?.resume()?;
        info!(job_id = id, "Scan resumed");
        Ok(())
    }

    pub fn stop(&self, id: JobId) -> Result<(), ScanError> {
        self.require(id)?.stop()?;
        info!(job_id = id, "Scan stopped");
        Ok(())
    }

    /// Pause every running job. Returns how many were paused.
    pub fn pause_all(&self) -> usize {
        self.for_each_job("pause", |job| job.pause())
    }

    pub fn resume_all(&self) -> usize {
        self.for_each_job("resume", |job| job.resume())
    }

    pub fn stop_all(&self) -> usize {
        self.for_each_job("stop", |job| job.stop())
    }

    // Runs outside the registry lock. One job failing never stops the loop.
    fn for_each_job<F>(&self, action: &str, apply: F) -> usize
    where
        F: Fn(&ScanJob) -> Result<(), ScanError>,
    {
        let mut applied = 0;
        for job in self.list_all() {
            match apply(&job) {
                Ok(()) => applied += 1,
                Err(e) => debug!(job_id = job.id(), action = %action, error = %e, "Skipping scan"),
            }
        }
        info!(action = %action, applied = applied, "Bulk scan operation complete");
        applied
    }
}

fn stop_quietly(job: &ScanJob) {
    if job.is_stopped() {
        return;
    }
    if let Err(e) = job.stop() {
        warn!(job_id = job.id(), error = %e, "Failed to stop scan");
    }
}
