use std::path::PathBuf;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::attack::{AttackModeConfig, DEFAULT_POLL_INTERVAL, DEFAULT_POOL_SIZE, DEFAULT_STATUS_DEBOUNCE};
use crate::policy::{AlertThreshold, AttackStrength, DEFAULT_POLICY_NAME};

pub const DEFAULT_POLICY_DIR: &str = "./policies";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8090;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AscanConfig {
    pub scanner: Option<ScannerConfig>,
    pub attack_mode: Option<AttackModeSettings>,
    pub api: Option<ApiConfig>,
}

impl AscanConfig {
    pub fn scanner(&self) -> ScannerConfig {
        self.scanner.clone().unwrap_or_default()
    }

    pub fn attack_mode(&self) -> AttackModeSettings {
        self.attack_mode.clone().unwrap_or_default()
    }

    pub fn api(&self) -> ApiConfig {
        self.api.clone().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ScannerConfig {
    pub policy_dir: Option<String>,
    /// Extra plugin definitions, `*.yaml` files merged over the built-ins.
    pub plugin_dir: Option<String>,
    pub default_policy: Option<String>,
    pub attack_policy: Option<String>,
    pub default_threshold: Option<AlertThreshold>,
    pub default_strength: Option<AttackStrength>,
    pub excluded_urls: Option<Vec<String>>,
}

impl ScannerConfig {
    pub fn policy_dir(&self) -> PathBuf {
        PathBuf::from(self.policy_dir.as_deref().unwrap_or(DEFAULT_POLICY_DIR))
    }

    pub fn default_policy(&self) -> &str {
        self.default_policy.as_deref().unwrap_or(DEFAULT_POLICY_NAME)
    }

    /// Falls back to the default policy name.
    pub fn attack_policy(&self) -> &str {
        self.attack_policy.as_deref().unwrap_or_else(|| self.default_policy())
    }

    pub fn excluded_urls(&self) -> &[String] {
        self.excluded_urls.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AttackModeSettings {
    pub pool_size: Option<usize>,
    pub rescan_on_scope_change: Option<bool>,
    pub poll_interval_ms: Option<u64>,
    pub status_debounce_ms: Option<u64>,
}

impl AttackModeSettings {
    pub fn to_runtime(&self) -> AttackModeConfig {
        AttackModeConfig {
            pool_size: self.pool_size.unwrap_or(DEFAULT_POOL_SIZE),
            rescan_on_scope_change: self.rescan_on_scope_change.unwrap_or(true),
            poll_interval: self.poll_interval_ms.map(Duration::from_millis).unwrap_or(DEFAULT_POLL_INTERVAL),
            status_debounce: self
                .status_debounce_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_STATUS_DEBOUNCE),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ApiConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl ApiConfig {
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_defaults() {
        let config = AscanConfig::default();
        let scanner = config.scanner();
        assert_eq!(scanner.policy_dir(), PathBuf::from(DEFAULT_POLICY_DIR));
        assert_eq!(scanner.default_policy(), "Default Policy");
        assert_eq!(scanner.attack_policy(), "Default Policy");
        assert!(scanner.excluded_urls().is_empty());
        assert_eq!(config.api().port(), DEFAULT_PORT);
        assert_eq!(config.api().host(), "127.0.0.1");
    }

    #[test]
    fn test_attack_policy_falls_back_to_default_policy() {
        let scanner = ScannerConfig {
            default_policy: Some("Site".into()),
            ..Default::default()
        };
        assert_eq!(scanner.attack_policy(), "Site");
    }

    #[test]
    fn test_attack_mode_runtime_defaults() {
        let runtime = AttackModeSettings::default().to_runtime();
        assert_eq!(runtime.pool_size, 4);
        assert!(runtime.rescan_on_scope_change);
        assert_eq!(runtime.poll_interval, Duration::from_millis(500));
        assert_eq!(runtime.status_debounce, Duration::from_millis(200));
    }

    #[test]
    fn test_attack_mode_runtime_overrides() {
        let settings = AttackModeSettings {
            pool_size: Some(8),
            rescan_on_scope_change: Some(false),
            poll_interval_ms: Some(50),
            status_debounce_ms: None,
        };
        let runtime = settings.to_runtime();
        assert_eq!(runtime.pool_size, 8);
        assert!(!runtime.rescan_on_scope_change);
        assert_eq!(runtime.poll_interval, Duration::from_millis(50));
    }

    #[test]
    fn test_threshold_deserializes_from_yaml() {
        let config: AscanConfig = serde_yaml::from_str("scanner:\n  default_threshold: LOW\n  default_strength: INSANE\n").unwrap();
        let scanner = config.scanner();
        assert_eq!(scanner.default_threshold, Some(AlertThreshold::Low));
        assert_eq!(scanner.default_strength, Some(AttackStrength::Insane));
    }
}
