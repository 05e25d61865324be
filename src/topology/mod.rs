pub mod node;
pub mod tree;

pub use node::{normalize_url, site_of, NodeId, SiteNode, TopologyEvent};
pub use tree::{MemorySiteTree, SiteTree};
