use std::sync::Mutex;
use regex::Regex;
use crate::errors::ScanError;
use crate::utils::lock;
use tracing::info;

/// Scan options shared by every job the controller creates.
#[derive(Debug, Default)]
pub struct ScanOptions {
    excluded: Mutex<Vec<Regex>>,
}

impl ScanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build with an initial exclusion list. Fails on the first bad pattern.
    pub fn with_exclusions<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ScanError> {
        let excluded = patterns
            .iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { excluded: Mutex::new(excluded) })
    }

    /// Exclude URLs matching `pattern` from jobs created from now on.
    pub fn exclude(&self, pattern: &str) -> Result<(), ScanError> {
        let regex = Regex::new(pattern)?;
        let mut excluded = lock(&self.excluded);
        if !excluded.iter().any(|r| r.as_str() == pattern) {
            excluded.push(regex);
            info!(pattern = %pattern, "URL excluded from scans");
        }
        Ok(())
    }

    pub fn clear_exclusions(&self) {
        lock(&self.excluded).clear();
        info!("Scan exclusions cleared");
    }

    pub fn exclusion_patterns(&self) -> Vec<String> {
        lock(&self.excluded).iter().map(|r| r.as_str().to_string()).collect()
    }

    /// Copy of the current list, handed to each new engine.
    pub fn exclusions(&self) -> Vec<Regex> {
        lock(&self.excluded).clone()
    }
}
