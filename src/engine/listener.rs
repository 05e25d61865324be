use std::sync::{Arc, Mutex};
use crate::utils::lock;
use super::finding::Finding;

/// Callbacks a scan engine makes while it runs. Every method has an empty
/// default so listeners only implement what they care about.
pub trait ScanListener: Send + Sync {
    fn alert_found(&self, _finding: &Finding) {}

    fn host_progress(&self, _host: &str, _message: &str, _percent: u8) {}

    fn host_complete(&self, _host: &str) {}

    fn scanner_complete(&self) {}

    /// A request/response pair was recorded for `url`.
    fn notify_new_message(&self, _url: &str) {}
}

type FindingCallback = Box<dyn Fn(&Finding) + Send + Sync>;

/// Adapts a closure into a listener that only sees findings.
pub struct FindingObserver {
    callback: FindingCallback,
}

impl FindingObserver {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Finding) + Send + Sync + 'static,
    {
        Self { callback: Box::new(callback) }
    }
}

impl ScanListener for FindingObserver {
    fn alert_found(&self, finding: &Finding) {
        (self.callback)(finding);
    }
}

/// Fans every callback out to a list of listeners.
#[derive(Default)]
pub struct ListenerSet {
    listeners: Mutex<Vec<Arc<dyn ScanListener>>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn ScanListener>) {
        lock(&self.listeners).push(listener);
    }

    /// Register a closure to run for every finding.
    pub fn on_finding<F>(&self, callback: F)
    where
        F: Fn(&Finding) + Send + Sync + 'static,
    {
        self.add(Arc::new(FindingObserver::new(callback)));
    }

    pub fn len(&self) -> usize {
        lock(&self.listeners).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.listeners).is_empty()
    }

    // Snapshot so callbacks never run with the list locked.
    fn snapshot(&self) -> Vec<Arc<dyn ScanListener>> {
        lock(&self.listeners).clone()
    }
}

impl ScanListener for ListenerSet {
    fn alert_found(&self, finding: &Finding) {
        for listener in self.snapshot() {
            listener.alert_found(finding);
        }
    }

    fn host_progress(&self, host: &str, message: &str, percent: u8) {
        for listener in self.snapshot() {
            listener.host_progress(host, message, percent);
        }
    }

    fn host_complete(&self, host: &str) {
        for listener in self.snapshot() {
            listener.host_complete(host);
        }
    }

    fn scanner_complete(&self) {
        for listener in self.snapshot() {
            listener.scanner_complete();
        }
    }

    fn notify_new_message(&self, url: &str) {
        for listener in self.snapshot() {
            listener.notify_new_message(url);
        }
    }
}
