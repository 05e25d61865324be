use serde::{Deserialize, Serialize};
use crate::policy::PluginId;

/// Risk level of a finding, ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Risk {
    High,
    Medium,
    Low,
    Informational,
}

impl Risk {
    /// Lower values are more severe. High = 0 ... Informational = 3.
    pub fn rank(&self) -> u8 {
        match self {
            Risk::High => 0,
            Risk::Medium => 1,
            Risk::Low => 2,
            Risk::Informational => 3,
        }
    }
}

/// A finding raised by a scanner while probing a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub plugin_id: PluginId,
    pub name: String,
    pub risk: Risk,
    pub url: String,
    pub param: Option<String>,
    pub evidence: Option<String>,
    pub cwe_id: Option<u32>,
}
