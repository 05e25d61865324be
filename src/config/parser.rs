use std::path::Path;
use crate::errors::ScanError;
use crate::policy::validate_name;
use super::types::AscanConfig;
use super::schema::CONFIG_SCHEMA;
use tracing::{debug, warn};

const MAX_CONFIG_BYTES: u64 = 1_048_576;

pub async fn parse_config(path: &Path) -> Result<AscanConfig, ScanError> {
    if !path.exists() {
        return Err(ScanError::Config(format!("Config file not found: {}", path.display())));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > MAX_CONFIG_BYTES {
        return Err(ScanError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    let yaml: serde_yaml::Value = serde_yaml::from_str(&content)?;
    if yaml.is_null() {
        debug!(path = %path.display(), "Config file is empty, using defaults");
        return Ok(AscanConfig::default());
    }

    validate_schema(&yaml)?;

    let config: AscanConfig = serde_yaml::from_value(yaml)?;
    validate_conflicts(&config)?;

    Ok(config)
}

/// Parse `path` when given, otherwise use the built-in defaults.
pub async fn load_config(path: Option<&Path>) -> Result<AscanConfig, ScanError> {
    match path {
        Some(path) => parse_config(path).await,
        None => Ok(AscanConfig::default()),
    }
}

/// Check the raw document against the JSON schema. Violations are logged,
/// not fatal; typed parsing catches anything that would break.
fn validate_schema(yaml: &serde_yaml::Value) -> Result<(), ScanError> {
    let json_value = serde_json::to_value(yaml)
        .map_err(|e| ScanError::Config(format!("Config conversion error: {}", e)))?;

    let compiled = jsonschema::JSONSchema::compile(&CONFIG_SCHEMA)
        .map_err(|e| ScanError::Config(format!("Schema compilation error: {}", e)))?;

    if let Err(errors) = compiled.validate(&json_value) {
        for error in errors {
            warn!(validation_error = %error, path = %error.instance_path, "Config schema warning");
        }
    }

    Ok(())
}

/// Reject values that parse but cannot work.
fn validate_conflicts(config: &AscanConfig) -> Result<(), ScanError> {
    if let Some(attack) = &config.attack_mode {
        if attack.pool_size == Some(0) {
            return Err(ScanError::Config("attack_mode.pool_size must be at least 1".into()));
        }
        if attack.poll_interval_ms == Some(0) {
            return Err(ScanError::Config("attack_mode.poll_interval_ms must be positive".into()));
        }
    }

    if let Some(scanner) = &config.scanner {
        for pattern in scanner.excluded_urls() {
            regex::Regex::new(pattern).map_err(|e| {
                ScanError::Config(format!("Invalid excluded_urls pattern '{}': {}", pattern, e))
            })?;
        }
        for name in [&scanner.default_policy, &scanner.attack_policy].into_iter().flatten() {
            validate_name(name).map_err(|e| ScanError::Config(e.to_string()))?;
        }
        if scanner.attack_policy.is_some() && scanner.attack_policy == scanner.default_policy {
            debug!("Attack mode shares the default scan policy");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AttackModeSettings, ScannerConfig};
    use std::io::Write;

    #[test]
    fn test_validate_conflicts_zero_pool() {
        let config = AscanConfig {
            attack_mode: Some(AttackModeSettings {
                pool_size: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(validate_conflicts(&config), Err(ScanError::Config(_))));
    }

    #[test]
    fn test_validate_conflicts_bad_exclusion() {
        let config = AscanConfig {
            scanner: Some(ScannerConfig {
                excluded_urls: Some(vec!["(unclosed".into()]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = validate_conflicts(&config).unwrap_err();
        assert!(err.to_string().contains("(unclosed"));
    }

    #[test]
    fn test_validate_conflicts_illegal_policy_name() {
        let config = AscanConfig {
            scanner: Some(ScannerConfig {
                attack_policy: Some("bad/name".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(validate_conflicts(&config).is_err());
    }

    #[test]
    fn test_validate_conflicts_empty_config() {
        assert!(validate_conflicts(&AscanConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_parse_full_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "scanner:\n  policy_dir: /tmp/policies\n  default_policy: Site\n  excluded_urls:\n    - \".*logout.*\"\nattack_mode:\n  pool_size: 2\napi:\n  port: 9000\n"
        )
        .unwrap();

        let config = parse_config(file.path()).await.unwrap();
        assert_eq!(config.scanner().default_policy(), "Site");
        assert_eq!(config.scanner().excluded_urls(), &[".*logout.*".to_string()]);
        assert_eq!(config.attack_mode().to_runtime().pool_size, 2);
        assert_eq!(config.api().port(), 9000);
    }

    #[tokio::test]
    async fn test_parse_missing_file() {
        let err = parse_config(Path::new("/nonexistent/ascan.yaml")).await.unwrap_err();
        assert!(matches!(err, ScanError::Config(_)));
    }

    #[tokio::test]
    async fn test_parse_empty_file_uses_defaults() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = parse_config(file.path()).await.unwrap();
        assert!(config.scanner.is_none());
    }

    #[tokio::test]
    async fn test_parse_rejects_wrong_types() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "attack_mode:\n  pool_size: many\n").unwrap();
        assert!(matches!(parse_config(file.path()).await, Err(ScanError::Yaml(_))));
    }

    #[tokio::test]
    async fn test_load_config_without_path() {
        let config = load_config(None).await.unwrap();
        assert!(config.attack_mode.is_none());
    }
}
