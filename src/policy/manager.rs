use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use crate::errors::ScanError;
use crate::utils::lock;
use super::catalog::PluginCatalog;
use super::level::{AlertThreshold, AttackStrength};
use super::scan_policy::{Policy, PolicyDocument};
use tracing::{debug, info, warn};

pub const POLICY_EXTENSION: &str = "policy";
pub const DEFAULT_POLICY_NAME: &str = "Default Policy";

const ILLEGAL_NAME_CHARS: &[char] = &[
    '/', '`', '?', '*', '\\', '<', '>', '|', '"', ':', '\t', '\n', '\r',
];

/// Reject names that are empty or could not be used as a file name.
pub fn validate_name(name: &str) -> Result<(), ScanError> {
    if name.trim().is_empty() {
        return Err(ScanError::IllegalPolicyName("policy name is empty".into()));
    }
    if let Some(c) = name.chars().find(|c| ILLEGAL_NAME_CHARS.contains(c)) {
        return Err(ScanError::IllegalPolicyName(format!(
            "'{}' contains illegal character {:?}",
            name, c
        )));
    }
    Ok(())
}

/// Durable store of named policies, one `<name>.policy` file each.
pub struct PolicyManager {
    dir: PathBuf,
    catalog: Arc<PluginCatalog>,
    default_name: String,
    attack_name: String,
    default_threshold: AlertThreshold,
    default_strength: AttackStrength,
    names: Mutex<Vec<String>>,
}

impl PolicyManager {
    pub fn new(dir: impl Into<PathBuf>, catalog: Arc<PluginCatalog>) -> Self {
        Self {
            dir: dir.into(),
            catalog,
            default_name: DEFAULT_POLICY_NAME.to_string(),
            attack_name: DEFAULT_POLICY_NAME.to_string(),
            default_threshold: AlertThreshold::default(),
            default_strength: AttackStrength::default(),
            names: Mutex::new(Vec::new()),
        }
    }

    /// Preferred policy names for regular scans and for attack mode.
    pub fn with_preferred_names(mut self, default_name: &str, attack_name: &str) -> Self {
        self.default_name = default_name.to_string();
        self.attack_name = attack_name.to_string();
        self
    }

    /// Threshold and strength used when a default policy has to be created.
    pub fn with_defaults(mut self, threshold: AlertThreshold, strength: AttackStrength) -> Self {
        self.default_threshold = threshold;
        self.default_strength = strength;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn catalog(&self) -> &Arc<PluginCatalog> {
        &self.catalog
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    pub fn attack_name(&self) -> &str {
        &self.attack_name
    }

    /// Fresh policy with every scanner at this store's defaults.
    pub fn new_policy(&self, name: &str) -> Policy {
        let mut policy = Policy::new(name, self.catalog.clone());
        policy.set_default_threshold(self.default_threshold);
        policy.set_default_strength(self.default_strength);
        policy
    }

    fn policy_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, POLICY_EXTENSION))
    }

    /// Names of every stored policy, sorted. An empty store gets a default
    /// policy written to it first.
    pub fn list_names(&self) -> Result<Vec<String>, ScanError> {
        std::fs::create_dir_all(&self.dir)?;
        let mut names = self.scan_dir()?;

        if names.is_empty() {
            info!(name = %self.default_name, dir = %self.dir.display(), "No policies found, creating default policy");
            let policy = self.new_policy(&self.default_name);
            self.write(&policy, &self.policy_path(policy.name()))?;
            names.push(policy.name().to_string());
        }

        *lock(&self.names) = names.clone();
        Ok(names)
    }

    /// Last known name index, without touching the filesystem.
    pub fn cached_names(&self) -> Vec<String> {
        lock(&self.names).clone()
    }

    fn scan_dir(&self) -> Result<Vec<String>, ScanError> {
        // The directory itself may contain glob metacharacters.
        let dir = glob::Pattern::escape(&self.dir.to_string_lossy());
        let pattern = Path::new(&dir).join(format!("*.{}", POLICY_EXTENSION));
        let pattern_str = pattern.to_string_lossy();

        let mut names = Vec::new();
        for entry in glob::glob(&pattern_str)
            .map_err(|e| ScanError::Config(format!("Invalid glob pattern: {}", e)))?
        {
            let path = entry.map_err(|e| ScanError::Persistence(format!("Glob error: {}", e)))?;
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn exists(&self, name: &str) -> bool {
        validate_name(name).is_ok() && self.policy_path(name).is_file()
    }

    pub fn save(&self, policy: &Policy) -> Result<(), ScanError> {
        self.save_renamed(policy, None)
    }

    /// Persist `policy`. When `previous_name` differs from the policy's
    /// current name the old entry is removed and the index renamed.
    pub fn save_renamed(&self, policy: &Policy, previous_name: Option<&str>) -> Result<(), ScanError> {
        validate_name(policy.name())?;
        if let Some(previous) = previous_name {
            validate_name(previous)?;
        }

        std::fs::create_dir_all(&self.dir)?;
        self.write(policy, &self.policy_path(policy.name()))?;

        let renamed_from = previous_name.filter(|previous| *previous != policy.name());
        if let Some(previous) = renamed_from {
            match std::fs::remove_file(self.policy_path(previous)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(policy = %previous, error = %e, "Failed to remove renamed policy file"),
            }
        }

        let mut names = lock(&self.names);
        if let Some(previous) = renamed_from {
            names.retain(|n| n != previous);
        }
        if !names.iter().any(|n| n == policy.name()) {
            names.push(policy.name().to_string());
            names.sort();
        }
        info!(policy = %policy.name(), "Saved scan policy");
        Ok(())
    }

    fn write(&self, policy: &Policy, path: &Path) -> Result<(), ScanError> {
        let yaml = serde_yaml::to_string(&policy.to_document())?;
        std::fs::write(path, yaml).map_err(|e| {
            ScanError::Persistence(format!("Failed to write {}: {}", path.display(), e))
        })
    }

    fn read(&self, path: &Path) -> Result<PolicyDocument, ScanError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ScanError::Persistence(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Load a stored policy. The file name is authoritative for the name.
    pub fn load(&self, name: &str) -> Result<Policy, ScanError> {
        validate_name(name)?;
        let path = self.policy_path(name);
        if !path.is_file() {
            return Err(ScanError::PolicyNotFound(name.to_string()));
        }

        let doc = self.read(&path)?;
        let stored_name = doc.policy.clone();
        let mut policy = Policy::from_document(doc, self.catalog.clone());
        if stored_name != name {
            warn!(file = %name, stored = %stored_name, "Policy name differs from its file name, using file name");
            policy.set_name(name);
        }
        Ok(policy)
    }

    /// Copy an external policy file into the store, renaming it to
    /// `name2`, `name3`, ... when the name is taken.
    pub fn import_from(&self, file: &Path) -> Result<Policy, ScanError> {
        let doc = self.read(file)?;
        let base = if validate_name(&doc.policy).is_ok() {
            doc.policy.clone()
        } else {
            file.file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
                .ok_or_else(|| ScanError::IllegalPolicyName(doc.policy.clone()))?
        };
        validate_name(&base)?;

        let mut name = base.clone();
        let mut suffix = 2;
        while self.policy_path(&name).exists() {
            name = format!("{}{}", base, suffix);
            suffix += 1;
        }

        let mut policy = Policy::from_document(doc, self.catalog.clone());
        policy.set_name(&name);
        self.save(&policy)?;
        info!(policy = %name, file = %file.display(), "Imported scan policy");
        Ok(policy)
    }

    /// Write `policy` to an arbitrary file. The name index is not touched.
    pub fn export_to(&self, policy: &Policy, file: &Path) -> Result<(), ScanError> {
        if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        self.write(policy, file)?;
        info!(policy = %policy.name(), file = %file.display(), "Exported scan policy");
        Ok(())
    }

    /// Remove a stored policy. Returns `false` if it did not exist.
    pub fn delete(&self, name: &str) -> Result<bool, ScanError> {
        validate_name(name)?;
        let removed = match std::fs::remove_file(self.policy_path(name)) {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(ScanError::Persistence(format!("Failed to delete policy {}: {}", name, e))),
        };
        lock(&self.names).retain(|n| n != name);
        if removed {
            info!(policy = %name, "Deleted scan policy");
        }
        Ok(removed)
    }

    /// Policy for regular scans. Never fails.
    pub fn resolve_default(&self) -> Policy {
        self.resolve(&self.default_name)
    }

    /// Policy for attack mode. Never fails.
    pub fn resolve_attack(&self) -> Policy {
        self.resolve(&self.attack_name)
    }

    /// Preferred name, then the well-known default, then the first stored
    /// policy, then a blank in-memory policy.
    pub fn resolve(&self, preferred: &str) -> Policy {
        match self.load(preferred) {
            Ok(policy) => return policy,
            Err(e) => debug!(policy = %preferred, error = %e, "Preferred policy unavailable"),
        }

        if preferred != DEFAULT_POLICY_NAME {
            match self.load(DEFAULT_POLICY_NAME) {
                Ok(policy) => return policy,
                Err(e) => debug!(error = %e, "Well-known default policy unavailable"),
            }
        }

        match self.list_names() {
            Ok(names) => {
                for name in names {
                    match self.load(&name) {
                        Ok(policy) => return policy,
                        Err(e) => warn!(policy = %name, error = %e, "Skipping unreadable policy"),
                    }
                }
            }
            Err(e) => warn!(dir = %self.dir.display(), error = %e, "Failed to list policies"),
        }

        warn!(policy = %preferred, "No usable stored policy, using a blank policy");
        self.new_policy(&self.default_name)
    }
}
