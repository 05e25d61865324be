use serde::Serialize;

pub type NodeId = u64;

/// One entry of the site tree: a site root, a directory or a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteNode {
    pub id: NodeId,
    /// Normalised URL, no fragment and no trailing slash.
    pub url: String,
    /// `scheme://host[:port]` of the site this node belongs to.
    pub site: String,
    pub parent: Option<NodeId>,
    /// Placeholder entries (e.g. requests still being resolved) are never attacked.
    pub temporary: bool,
}

#[derive(Debug, Clone)]
pub enum TopologyEvent {
    NodeAdded(SiteNode),
    NodeRemoved(SiteNode),
}

/// Normalise a URL for lookups. Returns `None` if it does not parse.
pub fn normalize_url(raw: &str) -> Option<String> {
    let mut parsed = url::Url::parse(raw.trim()).ok()?;
    if !parsed.has_host() {
        return None;
    }
    parsed.set_fragment(None);
    Some(parsed.as_str().trim_end_matches('/').to_string())
}

/// `scheme://host[:port]` part of a URL.
pub fn site_of(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw.trim()).ok()?;
    if !parsed.has_host() {
        return None;
    }
    Some(parsed.origin().ascii_serialization())
}
