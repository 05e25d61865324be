use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use dashmap::{DashMap, DashSet};
use regex::Regex;
use tokio::sync::broadcast;
use crate::errors::ScanError;
use crate::utils::lock;
use super::node::{normalize_url, site_of, NodeId, SiteNode, TopologyEvent};
use tracing::debug;

const EVENT_CAPACITY: usize = 1024;

/// What the scan core needs from the site topology store.
pub trait SiteTree: Send + Sync {
    /// Find the node for `url`, if the tree knows it.
    fn resolve(&self, url: &str) -> Option<SiteNode>;

    fn node(&self, id: NodeId) -> Option<SiteNode>;

    /// Every node below `id`, not including `id` itself.
    fn descendants(&self, id: NodeId) -> Vec<SiteNode>;

    fn is_in_scope(&self, node: &SiteNode) -> bool;

    fn in_scope_nodes(&self) -> Vec<SiteNode>;

    /// Stream of node additions and removals.
    fn subscribe(&self) -> broadcast::Receiver<TopologyEvent>;

    /// Visual "being attacked" marker.
    fn set_under_attack(&self, id: NodeId, attacked: bool);
}

/// In-process site tree with regex-based scope.
pub struct MemorySiteTree {
    nodes: DashMap<NodeId, SiteNode>,
    by_url: DashMap<String, NodeId>,
    under_attack: DashSet<NodeId>,
    scope: Mutex<Vec<Regex>>,
    next_id: AtomicU64,
    insert_lock: Mutex<()>,
    events: broadcast::Sender<TopologyEvent>,
}

impl MemorySiteTree {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            nodes: DashMap::new(),
            by_url: DashMap::new(),
            under_attack: DashSet::new(),
            scope: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            insert_lock: Mutex::new(()),
            events,
        }
    }

    /// Add a URL regex to the scope.
    pub fn include_in_scope(&self, pattern: &str) -> Result<(), ScanError> {
        let regex = Regex::new(pattern)?;
        lock(&self.scope).push(regex);
        Ok(())
    }

    pub fn clear_scope(&self) {
        lock(&self.scope).clear();
    }

    /// Add `url` and any missing ancestors up to the site root.
    pub fn add_url(&self, url: &str) -> Result<SiteNode, ScanError> {
        self.insert(url, false)
    }

    /// Add a placeholder node that attack mode must ignore.
    pub fn add_temporary(&self, url: &str) -> Result<SiteNode, ScanError> {
        self.insert(url, true)
    }

    fn insert(&self, url: &str, temporary: bool) -> Result<SiteNode, ScanError> {
        let chain = url_chain(url).ok_or_else(|| ScanError::UrlNotFound(url.to_string()))?;
        let site = site_of(url).ok_or_else(|| ScanError::UrlNotFound(url.to_string()))?;
        let _guard = lock(&self.insert_lock);

        let mut parent = None;
        let mut leaf = None;
        let last = chain.len() - 1;
        for (i, entry) in chain.into_iter().enumerate() {
            let existing = self.by_url.get(&entry).and_then(|id| self.nodes.get(&*id).map(|n| n.clone()));
            let node = match existing {
                Some(node) => node,
                None => {
                    let node = SiteNode {
                        id: self.next_id.fetch_add(1, Ordering::SeqCst),
                        url: entry.clone(),
                        site: site.clone(),
                        parent,
                        temporary: temporary && i == last,
                    };
                    self.nodes.insert(node.id, node.clone());
                    self.by_url.insert(entry, node.id);
                    debug!(node_id = node.id, url = %node.url, "Site node added");
                    let _ = self.events.send(TopologyEvent::NodeAdded(node.clone()));
                    node
                }
            };
            parent = Some(node.id);
            leaf = Some(node);
        }

        leaf.ok_or_else(|| ScanError::UrlNotFound(url.to_string()))
    }

    /// Remove a node and everything below it. Returns how many nodes went.
    pub fn remove(&self, id: NodeId) -> usize {
        let Some(root) = self.node(id) else {
            return 0;
        };
        let mut doomed = self.descendants(id);
        doomed.reverse();
        doomed.push(root);

        for node in &doomed {
            self.nodes.remove(&node.id);
            self.by_url.remove(&node.url);
            self.under_attack.remove(&node.id);
            debug!(node_id = node.id, url = %node.url, "Site node removed");
            let _ = self.events.send(TopologyEvent::NodeRemoved(node.clone()));
        }
        doomed.len()
    }

    pub fn is_under_attack(&self, id: NodeId) -> bool {
        self.under_attack.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn children(&self, id: NodeId) -> Vec<SiteNode> {
        let mut children: Vec<SiteNode> = self.nodes.iter()
            .filter(|entry| entry.parent == Some(id))
            .map(|entry| entry.value().clone())
            .collect();
        children.sort_by_key(|n| n.id);
        children
    }
}

impl Default for MemorySiteTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteTree for MemorySiteTree {
    fn resolve(&self, url: &str) -> Option<SiteNode> {
        let key = normalize_url(url)?;
        let id = *self.by_url.get(&key)?;
        self.node(id)
    }

    fn node(&self, id: NodeId) -> Option<SiteNode> {
        self.nodes.get(&id).map(|n| n.clone())
    }

    fn descendants(&self, id: NodeId) -> Vec<SiteNode> {
        let mut result = Vec::new();
        let mut frontier = vec![id];
        while let Some(current) = frontier.pop() {
            for child in self.children(current) {
                frontier.push(child.id);
                result.push(child);
            }
        }
        result
    }

    fn is_in_scope(&self, node: &SiteNode) -> bool {
        lock(&self.scope).iter().any(|r| r.is_match(&node.url))
    }

    fn in_scope_nodes(&self) -> Vec<SiteNode> {
        let mut nodes: Vec<SiteNode> = self.nodes.iter()
            .map(|entry| entry.value().clone())
            .filter(|node| self.is_in_scope(node))
            .collect();
        nodes.sort_by_key(|n| n.id);
        nodes
    }

    fn subscribe(&self) -> broadcast::Receiver<TopologyEvent> {
        self.events.subscribe()
    }

    fn set_under_attack(&self, id: NodeId, attacked: bool) {
        if attacked {
            self.under_attack.insert(id);
        } else {
            self.under_attack.remove(&id);
        }
    }
}

/// Site root followed by each path prefix of `url`, leaf last.
fn url_chain(url: &str) -> Option<Vec<String>> {
    let normalized = normalize_url(url)?;
    let root = site_of(url)?;
    let parsed = url::Url::parse(&normalized).ok()?;

    let mut chain = vec![root.clone()];
    let mut current = root;
    if let Some(segments) = parsed.path_segments() {
        for segment in segments.filter(|s| !s.is_empty()) {
            current = format!("{}/{}", current, segment);
            chain.push(current.clone());
        }
    }
    if chain.last() != Some(&normalized) {
        chain.push(normalized);
    }
    Some(chain)
}
