use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use crate::engine::{EngineSettings, ScanEngine, ScanEngineFactory, ScanListener};
use crate::policy::Policy;
use crate::topology::{SiteNode, SiteTree, TopologyEvent};
use crate::utils::lock;
use tracing::{debug, error, info, warn};

pub const DEFAULT_POOL_SIZE: usize = 4;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_STATUS_DEBOUNCE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttackState {
    Stopped,
    Starting,
    Running,
}

#[derive(Debug, Clone)]
pub struct AttackModeConfig {
    pub pool_size: usize,
    /// Seed the queue with every in-scope node on start and on scope changes.
    pub rescan_on_scope_change: bool,
    pub poll_interval: Duration,
    pub status_debounce: Duration,
}

impl Default for AttackModeConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            rescan_on_scope_change: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
            status_debounce: DEFAULT_STATUS_DEBOUNCE,
        }
    }
}

/// Status indicator fed by the scheduler.
pub trait AttackStatusObserver: Send + Sync {
    fn queue_changed(&self, _queued: usize) {}

    fn attack_started(&self) {}

    fn attack_stopped(&self) {}
}

struct Worker {
    node: SiteNode,
    engine: Arc<dyn ScanEngine>,
}

/// Wakes the loop as soon as a worker's engine completes.
struct WorkerListener {
    shared: Weak<Shared>,
}

impl ScanListener for WorkerListener {
    fn scanner_complete(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.wakeup.notify_one();
        }
    }
}

struct Shared {
    tree: Arc<dyn SiteTree>,
    factory: Arc<dyn ScanEngineFactory>,
    config: AttackModeConfig,
    observer: Option<Arc<dyn AttackStatusObserver>>,
    policy: Mutex<Policy>,
    state: Mutex<AttackState>,
    queue: Mutex<VecDeque<SiteNode>>,
    workers: Mutex<Vec<Worker>>,
    wakeup: Notify,
    status_dirty: AtomicBool,
    peak_workers: AtomicUsize,
}

struct Run {
    cancel: CancellationToken,
    scheduler: JoinHandle<()>,
    events: JoinHandle<()>,
}

/// Probes every in-scope node as it is discovered, through a bounded pool
/// of scan engines.
pub struct AttackModeScheduler {
    shared: Arc<Shared>,
    run: tokio::sync::Mutex<Option<Run>>,
}

impl AttackModeScheduler {
    pub fn new(
        tree: Arc<dyn SiteTree>,
        factory: Arc<dyn ScanEngineFactory>,
        policy: Policy,
        config: AttackModeConfig,
        observer: Option<Arc<dyn AttackStatusObserver>>,
    ) -> Self {
        let config = AttackModeConfig {
            pool_size: config.pool_size.max(1),
            ..config
        };
        Self {
            shared: Arc::new(Shared {
                tree,
                factory,
                config,
                observer,
                policy: Mutex::new(policy),
                state: Mutex::new(AttackState::Stopped),
                queue: Mutex::new(VecDeque::new()),
                workers: Mutex::new(Vec::new()),
                wakeup: Notify::new(),
                status_dirty: AtomicBool::new(false),
                peak_workers: AtomicUsize::new(0),
            }),
            run: tokio::sync::Mutex::new(None),
        }
    }

    /// Start attack mode, shutting down any previous run first.
    pub async fn start(&self) {
        let mut run = self.run.lock().await;
        if let Some(previous) = run.take() {
            info!("Restarting attack mode");
            self.shared.shutdown(previous).await;
        }
        self.shared.set_state(AttackState::Starting);
        lock(&self.shared.queue).clear();

        // Subscribe before seeding so nothing added in between is missed.
        let events = self.shared.tree.subscribe();
        if self.shared.config.rescan_on_scope_change {
            self.shared.seed();
        }
        self.shared.set_state(AttackState::Running);

        let cancel = CancellationToken::new();
        let scheduler = tokio::spawn(run_loop(self.shared.clone(), cancel.clone()));
        let events = tokio::spawn(handle_events(self.shared.clone(), events, cancel.clone()));
        *run = Some(Run { cancel, scheduler, events });

        info!(
            pool_size = self.shared.config.pool_size,
            queued = self.queue_len(),
            policy = %lock(&self.shared.policy).name(),
            "Attack mode started"
        );
        if let Some(observer) = &self.shared.observer {
            observer.attack_started();
        }
    }

    /// Stop dispatching, clear the queue and wait until every worker has
    /// been told to stop.
    pub async fn stop(&self) {
        let mut run = self.run.lock().await;
        match run.take() {
            Some(current) => self.shared.shutdown(current).await,
            None => debug!("Attack mode already stopped"),
        }
    }

    /// Re-seed the queue after the scope changed, when configured to.
    pub async fn scope_changed(&self) {
        if self.state() == AttackState::Running && self.shared.config.rescan_on_scope_change {
            self.start().await;
        }
    }

    pub fn state(&self) -> AttackState {
        *lock(&self.shared.state)
    }

    /// True while anything is queued or any worker is still probing.
    pub fn is_active(&self) -> bool {
        self.queue_len() > 0 || self.active_workers() > 0
    }

    pub fn queue_len(&self) -> usize {
        lock(&self.shared.queue).len()
    }

    pub fn queued_urls(&self) -> Vec<String> {
        lock(&self.shared.queue).iter().map(|n| n.url.clone()).collect()
    }

    pub fn active_workers(&self) -> usize {
        lock(&self.shared.workers).len()
    }

    /// Largest number of workers seen at once since creation.
    pub fn peak_workers(&self) -> usize {
        self.shared.peak_workers.load(Ordering::SeqCst)
    }

    pub fn pool_size(&self) -> usize {
        self.shared.config.pool_size
    }

    pub fn policy_name(&self) -> String {
        lock(&self.shared.policy).name().to_string()
    }

    /// Policy for workers started from now on.
    pub fn set_policy(&self, policy: Policy) {
        info!(policy = %policy.name(), "Attack mode policy changed");
        *lock(&self.shared.policy) = policy;
    }
}

impl Shared {
    fn set_state(&self, state: AttackState) {
        *lock(&self.state) = state;
    }

    fn seed(&self) {
        let nodes: Vec<SiteNode> = self.tree.in_scope_nodes().into_iter().filter(|n| !n.temporary).collect();
        let seeded = nodes.len();
        lock(&self.queue).extend(nodes);
        self.status_dirty.store(true, Ordering::SeqCst);
        debug!(seeded = seeded, "Attack queue seeded from scope");
    }

    fn node_added(&self, node: SiteNode) {
        let running = *lock(&self.state) == AttackState::Running;
        if !running || node.temporary || !self.tree.is_in_scope(&node) {
            return;
        }
        debug!(node_id = node.id, url = %node.url, "Queued for attack");
        lock(&self.queue).push_back(node);
        self.status_dirty.store(true, Ordering::SeqCst);
        self.wakeup.notify_one();
    }

    fn node_removed(&self, node: &SiteNode) {
        let mut queue = lock(&self.queue);
        let before = queue.len();
        queue.retain(|queued| queued.id != node.id);
        if queue.len() != before {
            debug!(node_id = node.id, url = %node.url, "Removed from attack queue");
            self.status_dirty.store(true, Ordering::SeqCst);
        }
    }

    fn publish_status(&self) {
        let queued = lock(&self.queue).len();
        if let Some(observer) = &self.observer {
            observer.queue_changed(queued);
        }
    }

    /// Drop workers whose engine has finished. Returns how many went.
    fn reap(&self) -> usize {
        let mut workers = lock(&self.workers);
        let before = workers.len();
        workers.retain(|worker| {
            if worker.engine.is_stopped() {
                self.tree.set_under_attack(worker.node.id, false);
                debug!(node_id = worker.node.id, url = %worker.node.url, "Attack worker finished");
                false
            } else {
                true
            }
        });
        before - workers.len()
    }

    fn has_work(&self) -> bool {
        let queued = lock(&self.queue).len();
        let busy = lock(&self.workers).len();
        queued > 0 && busy < self.config.pool_size
    }

    fn dispatch(self: &Arc<Self>) {
        let policy = lock(&self.policy).clone();
        let mut workers = lock(&self.workers);
        while workers.len() < self.config.pool_size {
            let Some(node) = lock(&self.queue).pop_front() else {
                break;
            };
            self.status_dirty.store(true, Ordering::SeqCst);

            let settings = EngineSettings::new(policy.clone())
                .with_start_node(Some(node.clone()))
                .with_scan_children(false)
                .with_just_scan_in_scope(true);
            let listener = Arc::new(WorkerListener { shared: Arc::downgrade(self) });
            let engine = self.factory.create(settings, listener);
            self.tree.set_under_attack(node.id, true);
            engine.start();
            info!(node_id = node.id, url = %node.url, "Attacking node");

            workers.push(Worker { node, engine });
            self.peak_workers.fetch_max(workers.len(), Ordering::SeqCst);
        }
    }

    fn stop_all_workers(&self) {
        let workers = std::mem::take(&mut *lock(&self.workers));
        for worker in &workers {
            worker.engine.stop();
            self.tree.set_under_attack(worker.node.id, false);
        }
        if !workers.is_empty() {
            info!(stopped = workers.len(), "Attack workers stopped");
        }
    }

    async fn shutdown(&self, run: Run) {
        self.set_state(AttackState::Stopped);
        run.cancel.cancel();
        if let Err(e) = run.events.await {
            warn!(error = %e, "Attack event handler ended abnormally");
        }
        if let Err(e) = run.scheduler.await {
            error!(error = %e, "Attack scheduler ended abnormally");
            self.stop_all_workers();
        }
        lock(&self.queue).clear();
        self.status_dirty.store(false, Ordering::SeqCst);
        if let Some(observer) = &self.observer {
            observer.queue_changed(0);
            observer.attack_stopped();
        }
        info!("Attack mode stopped");
    }
}

async fn run_loop(shared: Arc<Shared>, cancel: CancellationToken) {
    let debounce = shared.config.status_debounce;
    let mut last_status: Option<Instant> = None;

    while !cancel.is_cancelled() {
        let debounced = matches!(last_status, Some(at) if at.elapsed() < debounce);
        if !debounced && shared.status_dirty.load(Ordering::SeqCst) {
            shared.status_dirty.store(false, Ordering::SeqCst);
            shared.publish_status();
            last_status = Some(Instant::now());
        }

        if !shared.has_work() {
            shared.reap();
            if !shared.has_work() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = shared.wakeup.notified() => {}
                    _ = tokio::time::sleep(shared.config.poll_interval) => {}
                }
                continue;
            }
        }

        shared.dispatch();
    }

    shared.stop_all_workers();
}

async fn handle_events(
    shared: Arc<Shared>,
    mut events: broadcast::Receiver<TopologyEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => event,
        };
        match event {
            Ok(TopologyEvent::NodeAdded(node)) => shared.node_added(node),
            Ok(TopologyEvent::NodeRemoved(node)) => shared.node_removed(&node),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped = skipped, "Attack mode fell behind topology events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DryRunEngineFactory;
    use crate::policy::PluginCatalog;
    use crate::topology::MemorySiteTree;

    #[derive(Default)]
    struct ManualEngine {
        stopped: AtomicBool,
    }

    impl ScanEngine for ManualEngine {
        fn start(&self) {}
        fn stop(&self) {
            self.stopped.store(true, Ordering::SeqCst);
        }
        fn pause(&self) {}
        fn resume(&self) {}
        fn is_stopped(&self) -> bool {
            self.stopped.load(Ordering::SeqCst)
        }
        fn is_paused(&self) -> bool {
            false
        }
        fn progress(&self) -> u8 {
            0
        }
    }

    /// Engines never finish on their own.
    #[derive(Default)]
    struct ManualFactory {
        engines: Mutex<Vec<(String, Arc<ManualEngine>)>>,
    }

    impl ScanEngineFactory for ManualFactory {
        fn create(&self, settings: EngineSettings, _listener: Arc<dyn ScanListener>) -> Arc<dyn ScanEngine> {
            assert!(!settings.scan_children);
            let engine = Arc::new(ManualEngine::default());
            let url = settings.start_node.map(|n| n.url).unwrap_or_default();
            lock(&self.engines).push((url, engine.clone()));
            engine
        }
    }

    impl ManualFactory {
        fn urls(&self) -> Vec<String> {
            lock(&self.engines).iter().map(|(url, _)| url.clone()).collect()
        }

        fn engine_for(&self, url: &str) -> Arc<ManualEngine> {
            lock(&self.engines).iter().find(|(u, _)| u == url).map(|(_, e)| e.clone()).unwrap()
        }
    }

    #[derive(Default)]
    struct Recorder {
        started: AtomicUsize,
        stopped: AtomicUsize,
    }

    impl AttackStatusObserver for Recorder {
        fn attack_started(&self) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }

        fn attack_stopped(&self) {
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fast_config(pool_size: usize) -> AttackModeConfig {
        AttackModeConfig {
            pool_size,
            rescan_on_scope_change: true,
            poll_interval: Duration::from_millis(5),
            status_debounce: Duration::from_millis(1),
        }
    }

    fn policy() -> Policy {
        Policy::new("Attack", Arc::new(PluginCatalog::builtin()))
    }

    fn scoped_tree(paths: &[&str]) -> Arc<MemorySiteTree> {
        let tree = Arc::new(MemorySiteTree::new());
        tree.include_in_scope(r"^http://example\.com/.+").unwrap();
        for path in paths {
            tree.add_url(&format!("http://example.com/{}", path)).unwrap();
        }
        tree
    }

    async fn eventually<F: Fn() -> bool>(condition: F) {
        for _ in 0..400 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn test_pool_never_exceeds_configured_size() {
        let paths: Vec<String> = (0..12).map(|i| format!("page{}", i)).collect();
        let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
        let tree = scoped_tree(&refs);
        let factory = Arc::new(DryRunEngineFactory::new(tree.clone()).with_step_delay(Duration::from_millis(10)));
        let scheduler = AttackModeScheduler::new(tree, factory, policy(), fast_config(3), None);

        scheduler.start().await;
        assert_eq!(scheduler.state(), AttackState::Running);
        for _ in 0..100 {
            assert!(scheduler.active_workers() <= 3);
            if !scheduler.is_active() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        eventually(|| !scheduler.is_active()).await;

        assert_eq!(scheduler.peak_workers(), 3);
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_default_pool_size_is_four() {
        let tree = scoped_tree(&["a", "b", "c", "d", "e", "f"]);
        let factory = Arc::new(ManualFactory::default());
        let config = AttackModeConfig {
            poll_interval: Duration::from_millis(5),
            ..AttackModeConfig::default()
        };
        let scheduler = AttackModeScheduler::new(tree, factory.clone(), policy(), config, None);

        scheduler.start().await;
        eventually(|| scheduler.active_workers() == 4).await;
        assert_eq!(scheduler.queue_len(), 2);
        assert_eq!(factory.urls().len(), 4);
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_fifo_dispatch_and_reaping() {
        let tree = scoped_tree(&["a", "b", "c"]);
        let factory = Arc::new(ManualFactory::default());
        let scheduler = AttackModeScheduler::new(tree.clone(), factory.clone(), policy(), fast_config(1), None);

        scheduler.start().await;
        eventually(|| factory.urls().len() == 1).await;
        assert_eq!(factory.urls(), vec!["http://example.com/a"]);
        let a = tree.resolve("http://example.com/a").unwrap();
        assert!(tree.is_under_attack(a.id));

        factory.engine_for("http://example.com/a").stop();
        eventually(|| factory.urls().len() == 2).await;
        assert_eq!(factory.urls()[1], "http://example.com/b");
        assert!(!tree.is_under_attack(a.id));
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_removed_node_leaves_queue_but_not_worker() {
        let tree = scoped_tree(&["a", "b", "c"]);
        let factory = Arc::new(ManualFactory::default());
        let scheduler = AttackModeScheduler::new(tree.clone(), factory.clone(), policy(), fast_config(1), None);

        scheduler.start().await;
        eventually(|| scheduler.active_workers() == 1 && scheduler.queue_len() == 2).await;

        let b = tree.resolve("http://example.com/b").unwrap();
        tree.remove(b.id);
        eventually(|| scheduler.queue_len() == 1).await;
        assert_eq!(scheduler.queued_urls(), vec!["http://example.com/c"]);

        let a = tree.resolve("http://example.com/a").unwrap();
        tree.remove(a.id);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(scheduler.active_workers(), 1);
        assert!(!factory.engine_for("http://example.com/a").is_stopped());
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_new_nodes_filtered_by_scope_and_temporary_flag() {
        let tree = scoped_tree(&[]);
        let factory = Arc::new(ManualFactory::default());
        let scheduler = AttackModeScheduler::new(tree.clone(), factory.clone(), policy(), fast_config(4), None);

        scheduler.start().await;
        tree.add_url("http://example.com/new").unwrap();
        tree.add_temporary("http://example.com/tmp").unwrap();
        tree.add_url("http://elsewhere.com/x").unwrap();

        eventually(|| factory.urls().len() == 1).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(factory.urls(), vec!["http://example.com/new"]);
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_no_seeding_without_rescan() {
        let tree = scoped_tree(&["a", "b"]);
        let factory = Arc::new(ManualFactory::default());
        let config = AttackModeConfig {
            rescan_on_scope_change: false,
            ..fast_config(4)
        };
        let scheduler = AttackModeScheduler::new(tree.clone(), factory.clone(), policy(), config, None);

        scheduler.start().await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!scheduler.is_active());

        tree.add_url("http://example.com/c").unwrap();
        eventually(|| factory.urls() == vec!["http://example.com/c"]).await;
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_stop_force_stops_workers_and_clears_queue() {
        let tree = scoped_tree(&["a", "b", "c"]);
        let factory = Arc::new(ManualFactory::default());
        let recorder = Arc::new(Recorder::default());
        let scheduler = AttackModeScheduler::new(
            tree.clone(),
            factory.clone(),
            policy(),
            fast_config(2),
            Some(recorder.clone() as Arc<dyn AttackStatusObserver>),
        );

        scheduler.start().await;
        eventually(|| scheduler.active_workers() == 2).await;
        scheduler.stop().await;

        assert_eq!(scheduler.state(), AttackState::Stopped);
        assert!(!scheduler.is_active());
        assert!(lock(&factory.engines).iter().all(|(_, e)| e.is_stopped()));
        let a = tree.resolve("http://example.com/a").unwrap();
        assert!(!tree.is_under_attack(a.id));
        assert_eq!(recorder.started.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.stopped.load(Ordering::SeqCst), 1);

        // nodes added after stop are ignored
        tree.add_url("http://example.com/late").unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(scheduler.queue_len(), 0);
    }

    #[tokio::test]
    async fn test_restart_stops_previous_run() {
        let tree = scoped_tree(&["a"]);
        let factory = Arc::new(ManualFactory::default());
        let scheduler = AttackModeScheduler::new(tree, factory.clone(), policy(), fast_config(2), None);

        scheduler.start().await;
        eventually(|| factory.urls().len() == 1).await;
        let first = factory.engine_for("http://example.com/a");

        scheduler.start().await;
        assert!(first.is_stopped());
        eventually(|| factory.urls().len() == 2).await;
        assert_eq!(scheduler.active_workers(), 1);
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_set_policy_applies_to_new_workers() {
        let tree = scoped_tree(&[]);
        let factory = Arc::new(ManualFactory::default());
        let scheduler = AttackModeScheduler::new(tree, factory, policy(), fast_config(1), None);
        assert_eq!(scheduler.policy_name(), "Attack");
        scheduler.set_policy(Policy::new("Aggressive", Arc::new(PluginCatalog::builtin())));
        assert_eq!(scheduler.policy_name(), "Aggressive");
        assert_eq!(scheduler.state(), AttackState::Stopped);
    }
}
