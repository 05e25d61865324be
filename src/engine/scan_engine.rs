use std::sync::Arc;
use regex::Regex;
use crate::policy::Policy;
use crate::topology::SiteNode;
use super::listener::ScanListener;

/// Everything a scan engine instance is configured with before it starts.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub policy: Policy,
    /// Node to start from. `None` means every node the engine can see.
    pub start_node: Option<SiteNode>,
    pub scan_children: bool,
    pub just_scan_in_scope: bool,
    pub excluded_urls: Vec<Regex>,
}

impl EngineSettings {
    pub fn new(policy: Policy) -> Self {
        Self {
            policy,
            start_node: None,
            scan_children: true,
            just_scan_in_scope: false,
            excluded_urls: Vec::new(),
        }
    }

    pub fn with_start_node(mut self, node: Option<SiteNode>) -> Self {
        self.start_node = node;
        self
    }

    pub fn with_scan_children(mut self, scan_children: bool) -> Self {
        self.scan_children = scan_children;
        self
    }

    pub fn with_just_scan_in_scope(mut self, in_scope: bool) -> Self {
        self.just_scan_in_scope = in_scope;
        self
    }

    pub fn with_exclusions(mut self, excluded: Vec<Regex>) -> Self {
        self.excluded_urls = excluded;
        self
    }

    pub fn is_excluded(&self, url: &str) -> bool {
        self.excluded_urls.iter().any(|r| r.is_match(url))
    }
}

/// The probing engine behind a scan job or an attack-mode worker.
///
/// All lifecycle calls are signals: they return immediately and the engine
/// winds up or down on its own task.
pub trait ScanEngine: Send + Sync {
    fn start(&self);

    fn stop(&self);

    fn pause(&self);

    fn resume(&self);

    /// True once the engine has finished or has been stopped.
    fn is_stopped(&self) -> bool;

    fn is_paused(&self) -> bool;

    /// Overall progress, 0 to 100.
    fn progress(&self) -> u8;
}

pub trait ScanEngineFactory: Send + Sync {
    fn create(&self, settings: EngineSettings, listener: Arc<dyn ScanListener>) -> Arc<dyn ScanEngine>;
}
