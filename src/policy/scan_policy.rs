use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use crate::errors::ScanError;
use super::catalog::{Category, PluginCatalog, PluginId};
use super::level::{AlertThreshold, AttackStrength, CategorySetting};
use tracing::{debug, warn};

/// Per-scanner settings inside a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleState {
    pub enabled: bool,
    #[serde(rename = "level")]
    pub threshold: AlertThreshold,
    pub strength: AttackStrength,
}

impl ModuleState {
    /// Enabled and not switched off through its threshold.
    pub fn is_active(&self) -> bool {
        self.enabled && self.threshold != AlertThreshold::Off
    }

    fn effective_threshold(&self) -> AlertThreshold {
        if self.enabled { self.threshold } else { AlertThreshold::Off }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerDefaults {
    pub level: AlertThreshold,
    pub strength: AttackStrength,
}

/// On-disk shape of a policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDocument {
    pub policy: String,
    pub scanner: ScannerDefaults,
    #[serde(default)]
    pub plugins: BTreeMap<PluginId, ModuleState>,
}

/// A named bundle of default threshold/strength plus per-scanner overrides.
///
/// Cloning a policy copies its module table, so a clone handed to a running
/// scan never observes later edits to the original.
#[derive(Debug, Clone)]
pub struct Policy {
    name: String,
    default_threshold: AlertThreshold,
    default_strength: AttackStrength,
    modules: BTreeMap<PluginId, ModuleState>,
    catalog: Arc<PluginCatalog>,
}

impl Policy {
    pub fn new(name: &str, catalog: Arc<PluginCatalog>) -> Self {
        let default_threshold = AlertThreshold::default();
        let default_strength = AttackStrength::default();
        let modules = catalog.ids()
            .map(|id| (id, ModuleState {
                enabled: true,
                threshold: default_threshold,
                strength: default_strength,
            }))
            .collect();
        Self {
            name: name.to_string(),
            default_threshold,
            default_strength,
            modules,
            catalog,
        }
    }

    pub fn from_document(doc: PolicyDocument, catalog: Arc<PluginCatalog>) -> Self {
        let mut policy = Self::new(&doc.policy, catalog);
        policy.set_default_threshold(doc.scanner.level);
        policy.set_default_strength(doc.scanner.strength);
        for (id, state) in doc.plugins {
            match policy.modules.get_mut(&id) {
                Some(slot) => *slot = state,
                None => debug!(policy = %doc.policy, plugin_id = id, "Ignoring state for unknown scanner"),
            }
        }
        policy
    }

    pub fn to_document(&self) -> PolicyDocument {
        PolicyDocument {
            policy: self.name.clone(),
            scanner: ScannerDefaults {
                level: self.default_threshold,
                strength: self.default_strength,
            },
            plugins: self.modules.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn catalog(&self) -> &Arc<PluginCatalog> {
        &self.catalog
    }

    pub fn default_threshold(&self) -> AlertThreshold {
        self.default_threshold
    }

    pub fn default_strength(&self) -> AttackStrength {
        self.default_strength
    }

    /// Set the policy-wide threshold and push it onto every scanner.
    pub fn set_default_threshold(&mut self, threshold: AlertThreshold) {
        self.default_threshold = threshold;
        for state in self.modules.values_mut() {
            state.threshold = threshold;
        }
    }

    /// Set the policy-wide strength and push it onto every scanner.
    pub fn set_default_strength(&mut self, strength: AttackStrength) {
        self.default_strength = strength;
        for state in self.modules.values_mut() {
            state.strength = strength;
        }
    }

    pub fn module_state(&self, id: PluginId) -> Option<ModuleState> {
        self.modules.get(&id).copied()
    }

    pub fn modules(&self) -> impl Iterator<Item = (PluginId, &ModuleState)> {
        self.modules.iter().map(|(id, state)| (*id, state))
    }

    pub fn is_enabled(&self, id: PluginId) -> bool {
        self.modules.get(&id).is_some_and(ModuleState::is_active)
    }

    pub fn enabled_modules(&self) -> Vec<PluginId> {
        self.modules.iter()
            .filter(|(_, state)| state.is_active())
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn modules_in(&self, category: Category) -> Vec<PluginId> {
        self.catalog.in_category(category)
            .map(|p| p.id)
            .filter(|id| self.modules.contains_key(id))
            .collect()
    }

    /// Whether every direct dependency of `id` is enabled in this policy.
    /// Dependencies missing from the catalog count as unmet.
    pub fn dependencies_enabled(&self, id: PluginId) -> bool {
        let Some(plugin) = self.catalog.get(id) else {
            return false;
        };
        plugin.dependencies.iter().all(|dep| {
            if !self.catalog.contains(*dep) {
                warn!(plugin_id = id, dependency = dep, "Scanner depends on an unknown scanner");
                return false;
            }
            self.is_enabled(*dep)
        })
    }

    pub fn set_module_enabled(&mut self, id: PluginId, enabled: bool) -> Result<bool, ScanError> {
        if !self.modules.contains_key(&id) {
            return Err(ScanError::ScannerNotFound(id));
        }
        if enabled && !self.dependencies_enabled(id) {
            debug!(plugin_id = id, "Not enabling scanner, dependencies are not enabled");
            return Ok(false);
        }
        let fallback = self.fallback_threshold();
        if let Some(state) = self.modules.get_mut(&id) {
            state.enabled = enabled;
            if enabled && state.threshold == AlertThreshold::Off {
                state.threshold = fallback;
            }
        }
        Ok(true)
    }

    pub fn set_module_threshold(&mut self, id: PluginId, threshold: AlertThreshold) -> Result<(), ScanError> {
        let state = self.modules.get_mut(&id).ok_or(ScanError::ScannerNotFound(id))?;
        state.threshold = threshold;
        Ok(())
    }

    pub fn set_module_strength(&mut self, id: PluginId, strength: AttackStrength) -> Result<(), ScanError> {
        let state = self.modules.get_mut(&id).ok_or(ScanError::ScannerNotFound(id))?;
        state.strength = strength;
        Ok(())
    }

    /// Enable every scanner whose dependencies allow it. Returns the ids left disabled.
    pub fn enable_all(&mut self) -> Vec<PluginId> {
        let ids: Vec<PluginId> = self.modules.keys().copied().collect();
        let fallback = self.fallback_threshold();
        self.enable_gated(ids, |state| {
            state.enabled = true;
            if state.threshold == AlertThreshold::Off {
                state.threshold = fallback;
            }
        })
    }

    pub fn disable_all(&mut self) {
        for state in self.modules.values_mut() {
            state.enabled = false;
        }
    }

    /// Apply `threshold` to a whole category. `Off` disables every scanner in
    /// it; anything else enables them, except scanners whose dependencies
    /// stay unmet, which are left untouched. Returns the skipped ids.
    pub fn set_category_threshold(&mut self, category: Category, threshold: AlertThreshold) -> Vec<PluginId> {
        let ids = self.modules_in(category);
        if threshold == AlertThreshold::Off {
            for id in ids {
                if let Some(state) = self.modules.get_mut(&id) {
                    state.enabled = false;
                    state.threshold = AlertThreshold::Off;
                }
            }
            return Vec::new();
        }

        let skipped = self.enable_gated(ids, |state| {
            state.enabled = true;
            state.threshold = threshold;
        });
        for id in &skipped {
            debug!(plugin_id = id, category = %category, "Skipped scanner with unmet dependencies");
        }
        skipped
    }

    pub fn set_category_strength(&mut self, category: Category, strength: AttackStrength) {
        for id in self.modules_in(category) {
            if let Some(state) = self.modules.get_mut(&id) {
                state.strength = strength;
            }
        }
    }

    pub fn category_threshold(&self, category: Category) -> CategorySetting<AlertThreshold> {
        CategorySetting::collect(
            self.modules_in(category).iter()
                .filter_map(|id| self.modules.get(id))
                .map(ModuleState::effective_threshold),
        )
    }

    pub fn category_strength(&self, category: Category) -> CategorySetting<AttackStrength> {
        CategorySetting::collect(
            self.modules_in(category).iter()
                .filter_map(|id| self.modules.get(id))
                .map(|state| state.strength),
        )
    }

    /// Threshold given to a scanner that is switched on: the policy default,
    /// or `Medium` when the default is `Off`.
    pub fn fallback_threshold(&self) -> AlertThreshold {
        match self.default_threshold {
            AlertThreshold::Off => AlertThreshold::Medium,
            other => other,
        }
    }

    /// Apply `enable` to every id whose direct dependencies are enabled,
    /// repeating until nothing changes so scanners depending on others in
    /// the same batch are picked up. Returns the ids that were never ready.
    fn enable_gated<F>(&mut self, ids: Vec<PluginId>, enable: F) -> Vec<PluginId>
    where
        F: Fn(&mut ModuleState),
    {
        let mut pending = ids;
        loop {
            let ready: Vec<PluginId> = pending.iter()
                .copied()
                .filter(|id| self.dependencies_enabled(*id))
                .collect();
            if ready.is_empty() {
                break;
            }
            for id in &ready {
                if let Some(state) = self.modules.get_mut(id) {
                    enable(state);
                }
            }
            pending.retain(|id| !ready.contains(id));
        }
        pending
    }
}
