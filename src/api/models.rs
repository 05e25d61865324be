use serde::{Deserialize, Serialize};
use crate::errors::ScanError;
use crate::policy::{AlertThreshold, AttackStrength, Category, CategorySetting, PluginDefinition, PluginId, Policy};

#[derive(Debug, Deserialize)]
pub struct CreateScanRequest {
    pub url: String,
    pub recurse: Option<bool>,
    pub in_scope_only: Option<bool>,
    /// Stored policy to use instead of the shared scan policy.
    pub policy: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegexRequest {
    pub regex: String,
}

#[derive(Debug, Deserialize)]
pub struct UrlRequest {
    pub url: String,
}

/// Scanner ids to act on. Absent means every scanner.
#[derive(Debug, Default, Deserialize)]
pub struct ScannerIdsRequest {
    pub ids: Option<Vec<PluginId>>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryIdsRequest {
    pub ids: Vec<u8>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScannersQuery {
    pub policy: Option<String>,
    pub category: Option<u8>,
}

/// Threshold and/or strength update. Values are case-insensitive names.
#[derive(Debug, Default, Deserialize)]
pub struct LevelUpdate {
    pub threshold: Option<String>,
    pub strength: Option<String>,
}

impl LevelUpdate {
    pub fn threshold(&self) -> Result<Option<AlertThreshold>, ScanError> {
        self.threshold.as_deref().map(str::parse).transpose()
    }

    pub fn strength(&self) -> Result<Option<AttackStrength>, ScanError> {
        self.strength.as_deref().map(str::parse).transpose()
    }
}

#[derive(Debug, Serialize)]
pub struct ScannerInfo {
    pub id: PluginId,
    pub name: String,
    pub category: Category,
    pub category_id: u8,
    pub cwe_id: Option<u32>,
    pub wasc_id: Option<u32>,
    pub enabled: bool,
    pub threshold: AlertThreshold,
    pub strength: AttackStrength,
    pub dependencies: Vec<PluginId>,
}

impl ScannerInfo {
    pub fn from_policy(definition: &PluginDefinition, policy: &Policy) -> Self {
        let state = policy.module_state(definition.id);
        Self {
            id: definition.id,
            name: definition.name.clone(),
            category: definition.category,
            category_id: definition.category.id(),
            cwe_id: definition.cwe_id,
            wasc_id: definition.wasc_id,
            enabled: state.map(|s| s.enabled).unwrap_or(false),
            threshold: state.map(|s| s.threshold).unwrap_or(policy.default_threshold()),
            strength: state.map(|s| s.strength).unwrap_or(policy.default_strength()),
            dependencies: definition.dependencies.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CategoryInfo {
    pub id: u8,
    pub name: Category,
    pub threshold: CategorySetting<AlertThreshold>,
    pub strength: CategorySetting<AttackStrength>,
    pub scanners: usize,
}

impl CategoryInfo {
    pub fn for_policy(policy: &Policy) -> Vec<Self> {
        Category::ALL
            .iter()
            .map(|category| CategoryInfo {
                id: category.id(),
                name: *category,
                threshold: policy.category_threshold(*category),
                strength: policy.category_strength(*category),
                scanners: policy.modules_in(*category).len(),
            })
            .collect()
    }
}
