use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use crate::engine::{EngineSettings, Finding, ListenerSet, ScanEngine, ScanEngineFactory, ScanListener};
use crate::errors::ScanError;
use crate::policy::Policy;
use crate::topology::SiteNode;
use crate::utils::lock;
use tracing::{debug, info};

pub type JobId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Created,
    Running,
    Paused,
    Stopped,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Created => "created",
            JobState::Running => "running",
            JobState::Paused => "paused",
            JobState::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a job was asked to scan.
#[derive(Debug, Clone)]
pub struct JobTarget {
    pub label: String,
    pub node: Option<SiteNode>,
    pub recurse_children: bool,
    pub scope_only: bool,
}

/// Live counters fed by the engine's callbacks.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobProgress {
    /// Percent complete per host.
    pub hosts: BTreeMap<String, u8>,
    pub alerts: usize,
    pub messages: usize,
    pub finished: bool,
}

/// Engine-facing side of a job. Records progress then forwards every
/// callback to the job's observers.
struct JobMonitor {
    job_id: JobId,
    progress: Mutex<JobProgress>,
    observers: ListenerSet,
}

impl ScanListener for JobMonitor {
    fn alert_found(&self, finding: &Finding) {
        lock(&self.progress).alerts += 1;
        debug!(job_id = self.job_id, plugin_id = finding.plugin_id, url = %finding.url, "Finding raised");
        self.observers.alert_found(finding);
    }

    fn host_progress(&self, host: &str, message: &str, percent: u8) {
        lock(&self.progress).hosts.insert(host.to_string(), percent.min(100));
        self.observers.host_progress(host, message, percent);
    }

    fn host_complete(&self, host: &str) {
        lock(&self.progress).hosts.insert(host.to_string(), 100);
        debug!(job_id = self.job_id, host = %host, "Host complete");
        self.observers.host_complete(host);
    }

    fn scanner_complete(&self) {
        lock(&self.progress).finished = true;
        info!(job_id = self.job_id, "Scan engine finished");
        self.observers.scanner_complete();
    }

    fn notify_new_message(&self, url: &str) {
        lock(&self.progress).messages += 1;
        self.observers.notify_new_message(url);
    }
}

/// One active or recently finished scan.
pub struct ScanJob {
    id: JobId,
    target: JobTarget,
    policy: Policy,
    created_at: DateTime<Utc>,
    state: Mutex<JobState>,
    monitor: Arc<JobMonitor>,
    engine: Arc<dyn ScanEngine>,
}

impl ScanJob {
    /// Build the job and its engine. The engine is not started.
    pub fn new(
        id: JobId,
        target: JobTarget,
        policy: Policy,
        factory: &dyn ScanEngineFactory,
        excluded_urls: Vec<Regex>,
    ) -> Self {
        let monitor = Arc::new(JobMonitor {
            job_id: id,
            progress: Mutex::new(JobProgress::default()),
            observers: ListenerSet::new(),
        });
        let settings = EngineSettings::new(policy.clone())
            .with_start_node(target.node.clone())
            .with_scan_children(target.recurse_children)
            .with_just_scan_in_scope(target.scope_only)
            .with_exclusions(excluded_urls);
        let engine = factory.create(settings, monitor.clone());

        Self {
            id,
            target,
            policy,
            created_at: Utc::now(),
            state: Mutex::new(JobState::Created),
            monitor,
            engine,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// The site this job targets, e.g. `http://example.com`.
    pub fn site(&self) -> &str {
        &self.target.label
    }

    pub fn start_node(&self) -> Option<&SiteNode> {
        self.target.node.as_ref()
    }

    pub fn recurse_children(&self) -> bool {
        self.target.recurse_children
    }

    pub fn scope_only(&self) -> bool {
        self.target.scope_only
    }

    /// The policy snapshot taken when the job was created.
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Current state. A job whose engine has finished reads as `Stopped`.
    pub fn state(&self) -> JobState {
        let mut state = lock(&self.state);
        self.observe(&mut state);
        *state
    }

    fn observe(&self, state: &mut JobState) {
        if matches!(*state, JobState::Running | JobState::Paused) && self.engine.is_stopped() {
            *state = JobState::Stopped;
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == JobState::Stopped
    }

    pub fn progress(&self) -> u8 {
        self.engine.progress()
    }

    pub fn details(&self) -> JobProgress {
        lock(&self.monitor.progress).clone()
    }

    /// Listener list every engine callback is forwarded to.
    pub fn observers(&self) -> &ListenerSet {
        &self.monitor.observers
    }

    pub fn on_finding<F>(&self, callback: F)
    where
        F: Fn(&Finding) + Send + Sync + 'static,
    {
        self.monitor.observers.on_finding(callback);
    }

    pub fn start(&self) -> Result<(), ScanError> {
        self.transition("start", &[JobState::Created], JobState::Running, |e| e.start())
    }

    pub fn pause(&self) -> Result<(), ScanError> {
        self.transition("pause", &[JobState::Running], JobState::Paused, |e| e.pause())
    }

    pub fn resume(&self) -> Result<(), ScanError> {
        self.transition("resume", &[JobState::Paused], JobState::Running, |e| e.resume())
    }

    /// Signal the engine to stop. Returns before the engine has unwound.
    pub fn stop(&self) -> Result<(), ScanError> {
        self.transition(
            "stop",
            &[JobState::Created, JobState::Running, JobState::Paused],
            JobState::Stopped,
            |e| e.stop(),
        )
    }

    // Engine signals return immediately, so they are sent with the state
    // lock held to keep them in the same order as the transitions.
    fn transition<F>(
        &self,
        action: &'static str,
        from: &[JobState],
        to: JobState,
        signal: F,
    ) -> Result<(), ScanError>
    where
        F: FnOnce(&dyn ScanEngine),
    {
        let mut state = lock(&self.state);
        self.observe(&mut state);
        let current = *state;
        if !from.contains(&current) {
            return Err(ScanError::IllegalTransition {
                id: self.id,
                action,
                state: current.to_string(),
            });
        }
        signal(self.engine.as_ref());
        *state = to;
        debug!(job_id = self.id, from = %current, to = %to, "Scan state changed");
        Ok(())
    }

    pub fn summary(&self) -> JobSummary {
        let details = self.details();
        JobSummary {
            id: self.id,
            site: self.target.label.clone(),
            state: self.state(),
            progress: self.progress(),
            policy: self.policy.name().to_string(),
            recurse: self.target.recurse_children,
            in_scope_only: self.target.scope_only,
            alerts: details.alerts,
            messages: details.messages,
            hosts: details.hosts,
            created_at: self.created_at.to_rfc3339(),
        }
    }
}

impl std::fmt::Debug for ScanJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanJob")
            .field("id", &self.id)
            .field("site", &self.target.label)
            .field("state", &self.state())
            .finish()
    }
}

/// Serializable view of a job for listings and status queries.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub id: JobId,
    pub site: String,
    pub state: JobState,
    pub progress: u8,
    pub policy: String,
    pub recurse: bool,
    pub in_scope_only: bool,
    pub alerts: usize,
    pub messages: usize,
    pub hosts: BTreeMap<String, u8>,
    pub created_at: String,
}
