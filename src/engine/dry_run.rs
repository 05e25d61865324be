use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use crate::topology::{SiteNode, SiteTree};
use super::listener::ScanListener;
use super::scan_engine::{EngineSettings, ScanEngine, ScanEngineFactory};
use tracing::{debug, error, info, warn};

const DEFAULT_STEP_DELAY: Duration = Duration::from_millis(50);

/// Engine that walks its targets and reports progress without sending any
/// requests. Used by `ascan serve` when no real prober is attached.
pub struct DryRunEngine {
    inner: Arc<DryRun>,
}

struct DryRun {
    settings: EngineSettings,
    tree: Arc<dyn SiteTree>,
    listener: Arc<dyn ScanListener>,
    cancel: CancellationToken,
    paused: watch::Sender<bool>,
    started: AtomicBool,
    stopped: AtomicBool,
    progress: AtomicU8,
    step_delay: Duration,
}

impl DryRunEngine {
    pub fn new(
        settings: EngineSettings,
        tree: Arc<dyn SiteTree>,
        listener: Arc<dyn ScanListener>,
        step_delay: Duration,
    ) -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            inner: Arc::new(DryRun {
                settings,
                tree,
                listener,
                cancel: CancellationToken::new(),
                paused,
                started: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                progress: AtomicU8::new(0),
                step_delay,
            }),
        }
    }
}

impl ScanEngine for DryRunEngine {
    fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let inner = self.inner.clone();
                handle.spawn(async move { inner.run().await });
            }
            Err(e) => {
                error!(error = %e, "No async runtime available, dry-run engine not started");
                self.inner.finish();
            }
        }
    }

    fn stop(&self) {
        self.inner.cancel.cancel();
        if !self.inner.started.load(Ordering::SeqCst) {
            self.inner.stopped.store(true, Ordering::SeqCst);
        }
    }

    fn pause(&self) {
        self.inner.paused.send_replace(true);
    }

    fn resume(&self) {
        self.inner.paused.send_replace(false);
    }

    fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    fn is_paused(&self) -> bool {
        *self.inner.paused.borrow()
    }

    fn progress(&self) -> u8 {
        self.inner.progress.load(Ordering::SeqCst)
    }
}

impl DryRun {
    fn targets(&self) -> Vec<SiteNode> {
        if self.settings.policy.enabled_modules().is_empty() {
            warn!(policy = %self.settings.policy.name(), "Policy has no enabled scanners, nothing to do");
            return Vec::new();
        }

        let mut nodes = match &self.settings.start_node {
            Some(start) => {
                let mut nodes = vec![start.clone()];
                if self.settings.scan_children {
                    nodes.extend(self.tree.descendants(start.id));
                }
                nodes
            }
            None => self.tree.in_scope_nodes(),
        };
        nodes.retain(|node| {
            !node.temporary
                && !self.settings.is_excluded(&node.url)
                && (!self.settings.just_scan_in_scope || self.tree.is_in_scope(node))
        });
        nodes
    }

    async fn run(&self) {
        let targets = self.targets();
        let total = targets.len();
        info!(
            targets = total,
            scanners = self.settings.policy.enabled_modules().len(),
            "Dry-run scan started"
        );

        let mut host_totals: HashMap<&str, usize> = HashMap::new();
        for node in &targets {
            *host_totals.entry(node.site.as_str()).or_insert(0) += 1;
        }
        let mut host_done: HashMap<&str, usize> = HashMap::new();
        let mut paused = self.paused.subscribe();

        for (index, node) in targets.iter().enumerate() {
            if !self.wait_while_paused(&mut paused).await {
                break;
            }
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.step_delay) => {}
            }

            self.listener.notify_new_message(&node.url);
            let done = host_done.entry(node.site.as_str()).or_insert(0);
            *done += 1;
            let host_total = host_totals.get(node.site.as_str()).copied().unwrap_or(1);
            let percent = (*done * 100 / host_total) as u8;
            self.listener.host_progress(&node.site, &node.url, percent);
            if *done == host_total {
                self.listener.host_complete(&node.site);
            }
            self.progress.store(((index + 1) * 100 / total) as u8, Ordering::SeqCst);
        }

        if total == 0 {
            self.progress.store(100, Ordering::SeqCst);
        }
        if self.cancel.is_cancelled() {
            debug!("Dry-run scan stopped");
        } else {
            info!(targets = total, "Dry-run scan complete");
        }
        self.finish();
    }

    /// Block while paused. Returns false if the scan was stopped meanwhile.
    async fn wait_while_paused(&self, paused: &mut watch::Receiver<bool>) -> bool {
        loop {
            if self.cancel.is_cancelled() {
                return false;
            }
            let is_paused = *paused.borrow_and_update();
            if !is_paused {
                return true;
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                changed = paused.changed() => {
                    if changed.is_err() {
                        return true;
                    }
                }
            }
        }
    }

    fn finish(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.listener.scanner_complete();
    }
}

pub struct DryRunEngineFactory {
    tree: Arc<dyn SiteTree>,
    step_delay: Duration,
}

impl DryRunEngineFactory {
    pub fn new(tree: Arc<dyn SiteTree>) -> Self {
        Self { tree, step_delay: DEFAULT_STEP_DELAY }
    }

    pub fn with_step_delay(mut self, step_delay: Duration) -> Self {
        self.step_delay = step_delay;
        self
    }
}

impl ScanEngineFactory for DryRunEngineFactory {
    fn create(&self, settings: EngineSettings, listener: Arc<dyn ScanListener>) -> Arc<dyn ScanEngine> {
        Arc::new(DryRunEngine::new(settings, self.tree.clone(), listener, self.step_delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{PluginCatalog, Policy};
    use crate::topology::MemorySiteTree;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Recorder {
        messages: AtomicUsize,
        hosts_complete: AtomicUsize,
        completes: AtomicUsize,
    }

    impl ScanListener for Recorder {
        fn notify_new_message(&self, _url: &str) {
            self.messages.fetch_add(1, Ordering::SeqCst);
        }

        fn host_complete(&self, _host: &str) {
            self.hosts_complete.fetch_add(1, Ordering::SeqCst);
        }

        fn scanner_complete(&self) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn tree() -> Arc<MemorySiteTree> {
        let tree = Arc::new(MemorySiteTree::new());
        tree.add_url("http://example.com/a/b").unwrap();
        tree.add_url("http://example.com/c").unwrap();
        tree.add_url("http://other.com/x").unwrap();
        tree
    }

    fn policy() -> Policy {
        Policy::new("test", Arc::new(PluginCatalog::builtin()))
    }

    async fn wait_stopped(engine: &dyn ScanEngine) {
        for _ in 0..200 {
            if engine.is_stopped() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("engine did not stop in time");
    }

    #[tokio::test]
    async fn test_walks_start_node_and_children() {
        let tree = tree();
        let root = tree.resolve("http://example.com").unwrap();
        let recorder = Arc::new(Recorder::default());
        let settings = EngineSettings::new(policy()).with_start_node(Some(root));
        let engine = DryRunEngine::new(settings, tree, recorder.clone(), Duration::from_millis(1));

        engine.start();
        wait_stopped(&engine).await;

        assert_eq!(recorder.messages.load(Ordering::SeqCst), 4);
        assert_eq!(recorder.hosts_complete.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.completes.load(Ordering::SeqCst), 1);
        assert_eq!(engine.progress(), 100);
    }

    #[tokio::test]
    async fn test_single_node_without_children() {
        let tree = tree();
        let node = tree.resolve("http://example.com/a").unwrap();
        let recorder = Arc::new(Recorder::default());
        let settings = EngineSettings::new(policy())
            .with_start_node(Some(node))
            .with_scan_children(false);
        let engine = DryRunEngine::new(settings, tree, recorder.clone(), Duration::from_millis(1));

        engine.start();
        wait_stopped(&engine).await;
        assert_eq!(recorder.messages.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exclusions_and_scope_filter_targets() {
        let tree = tree();
        tree.include_in_scope(r"^http://example\.com").unwrap();
        let root = tree.resolve("http://example.com").unwrap();
        let recorder = Arc::new(Recorder::default());
        let settings = EngineSettings::new(policy())
            .with_start_node(Some(root))
            .with_just_scan_in_scope(true)
            .with_exclusions(vec![regex::Regex::new(r"/a(/|$)").unwrap()]);
        let engine = DryRunEngine::new(settings, tree, recorder.clone(), Duration::from_millis(1));

        engine.start();
        wait_stopped(&engine).await;
        // root and /c remain, /a and /a/b are excluded
        assert_eq!(recorder.messages.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stop_interrupts_scan() {
        let tree = tree();
        let recorder = Arc::new(Recorder::default());
        tree.include_in_scope(".*").unwrap();
        let settings = EngineSettings::new(policy());
        let engine = DryRunEngine::new(settings, tree, recorder.clone(), Duration::from_secs(30));

        engine.start();
        assert!(!engine.is_stopped());
        engine.stop();
        wait_stopped(&engine).await;
        assert_eq!(recorder.messages.load(Ordering::SeqCst), 0);
        assert_eq!(recorder.completes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_pause_holds_progress_until_resume() {
        let tree = tree();
        let root = tree.resolve("http://other.com").unwrap();
        let recorder = Arc::new(Recorder::default());
        let settings = EngineSettings::new(policy()).with_start_node(Some(root));
        let engine = DryRunEngine::new(settings, tree, recorder.clone(), Duration::from_millis(1));

        engine.pause();
        engine.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(engine.is_paused());
        assert_eq!(recorder.messages.load(Ordering::SeqCst), 0);

        engine.resume();
        wait_stopped(&engine).await;
        assert_eq!(recorder.messages.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_policy_without_scanners_finishes_immediately() {
        let tree = tree();
        let mut policy = policy();
        policy.disable_all();
        let recorder = Arc::new(Recorder::default());
        let engine = DryRunEngine::new(EngineSettings::new(policy), tree, recorder.clone(), Duration::from_millis(1));

        engine.start();
        wait_stopped(&engine).await;
        assert_eq!(engine.progress(), 100);
        assert_eq!(recorder.messages.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stop_before_start_marks_stopped() {
        let tree = tree();
        let engine = DryRunEngine::new(
            EngineSettings::new(policy()),
            tree,
            Arc::new(Recorder::default()),
            Duration::from_millis(1),
        );
        engine.stop();
        assert!(engine.is_stopped());
    }
}
