use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;
use crate::errors::ScanError;
use tracing::{info, warn};

pub type PluginId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    InfoGather,
    Browser,
    Server,
    Misc,
    Injection,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Self::InfoGather, Self::Browser, Self::Server, Self::Misc, Self::Injection,
    ];

    /// Stable numeric id used by the HTTP surface.
    pub fn id(&self) -> u8 {
        match self {
            Self::InfoGather => 0,
            Self::Browser => 1,
            Self::Server => 2,
            Self::Misc => 3,
            Self::Injection => 4,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.id() == id)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InfoGather => "info-gather",
            Self::Browser => "browser",
            Self::Server => "server",
            Self::Misc => "misc",
            Self::Injection => "injection",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One active-scan rule as known to the policy engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginDefinition {
    pub id: PluginId,
    pub name: String,
    pub category: Category,
    #[serde(default)]
    pub dependencies: Vec<PluginId>,
    pub cwe_id: Option<u32>,
    pub wasc_id: Option<u32>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct PluginFile {
    plugins: Vec<PluginDefinition>,
}

fn builtin(
    id: PluginId,
    name: &str,
    category: Category,
    dependencies: &[PluginId],
    cwe_id: u32,
    wasc_id: u32,
) -> PluginDefinition {
    PluginDefinition {
        id,
        name: name.to_string(),
        category,
        dependencies: dependencies.to_vec(),
        cwe_id: Some(cwe_id),
        wasc_id: Some(wasc_id),
        description: String::new(),
    }
}

pub static BUILTIN_PLUGINS: LazyLock<Vec<PluginDefinition>> = LazyLock::new(|| vec![
    builtin(0, "Directory Browsing", Category::Server, &[], 548, 48),
    builtin(6, "Path Traversal", Category::Server, &[], 22, 33),
    builtin(7, "Remote File Inclusion", Category::Server, &[], 98, 5),
    builtin(10045, "Source Code Disclosure - /WEB-INF Folder", Category::InfoGather, &[], 541, 34),
    builtin(10058, "GET for POST", Category::InfoGather, &[], 16, 20),
    builtin(20019, "External Redirect", Category::Misc, &[], 601, 38),
    builtin(30001, "Buffer Overflow", Category::Misc, &[], 120, 7),
    builtin(30002, "Format String Error", Category::Misc, &[], 134, 6),
    builtin(40003, "CRLF Injection", Category::Injection, &[], 113, 25),
    builtin(40008, "Parameter Tampering", Category::Misc, &[], 472, 20),
    builtin(40009, "Server Side Include", Category::Injection, &[], 97, 31),
    builtin(40012, "Cross Site Scripting (Reflected)", Category::Injection, &[], 79, 8),
    builtin(40014, "Cross Site Scripting (Persistent)", Category::Injection, &[40016, 40017], 79, 8),
    builtin(40016, "Cross Site Scripting (Persistent) - Prime", Category::Injection, &[], 79, 8),
    builtin(40017, "Cross Site Scripting (Persistent) - Spider", Category::Injection, &[40016], 79, 8),
    builtin(40018, "SQL Injection", Category::Injection, &[], 89, 19),
    builtin(90019, "Server Side Code Injection", Category::Injection, &[], 94, 20),
    builtin(90020, "Remote OS Command Injection", Category::Injection, &[], 78, 31),
    builtin(90023, "XML External Entity Attack", Category::Injection, &[], 611, 43),
]);

/// The set of scanners a policy can refer to.
#[derive(Debug, Clone, Default)]
pub struct PluginCatalog {
    plugins: BTreeMap<PluginId, PluginDefinition>,
}

impl PluginCatalog {
    pub fn builtin() -> Self {
        Self::from_definitions(BUILTIN_PLUGINS.iter().cloned())
    }

    pub fn from_definitions<I: IntoIterator<Item = PluginDefinition>>(definitions: I) -> Self {
        let plugins = definitions.into_iter().map(|p| (p.id, p)).collect();
        Self { plugins }
    }

    /// Add every `*.yaml` plugin file in `dir`. Later definitions replace
    /// earlier ones with the same id.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, ScanError> {
        if !dir.exists() {
            return Ok(0);
        }

        let escaped = glob::Pattern::escape(&dir.to_string_lossy());
        let pattern = Path::new(&escaped).join("*.yaml");
        let pattern_str = pattern.to_string_lossy();
        let mut loaded = 0;

        for entry in glob::glob(&pattern_str)
            .map_err(|e| ScanError::Config(format!("Invalid glob pattern: {}", e)))?
        {
            let path = entry.map_err(|e| ScanError::Config(format!("Glob error: {}", e)))?;
            let content = std::fs::read_to_string(&path)?;
            let file: PluginFile = serde_yaml::from_str(&content)?;
            info!(path = %path.display(), plugins = file.plugins.len(), "Loaded plugin definitions");
            for plugin in file.plugins {
                loaded += 1;
                if self.plugins.insert(plugin.id, plugin).is_some() {
                    warn!(path = %path.display(), "Plugin definition replaced an existing id");
                }
            }
        }

        Ok(loaded)
    }

    pub fn get(&self, id: PluginId) -> Option<&PluginDefinition> {
        self.plugins.get(&id)
    }

    pub fn contains(&self, id: PluginId) -> bool {
        self.plugins.contains_key(&id)
    }

    pub fn all(&self) -> impl Iterator<Item = &PluginDefinition> {
        self.plugins.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = PluginId> + '_ {
        self.plugins.keys().copied()
    }

    pub fn in_category(&self, category: Category) -> impl Iterator<Item = &PluginDefinition> {
        self.plugins.values().filter(move |p| p.category == category)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
