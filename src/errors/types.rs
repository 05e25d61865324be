use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Scan not found: {0}")]
    JobNotFound(u64),

    #[error("Target not found: {0}")]
    TargetNotFound(String),

    #[error("URL not found: {0}")]
    UrlNotFound(String),

    #[error("Policy not found: {0}")]
    PolicyNotFound(String),

    #[error("Scanner not found: {0}")]
    ScannerNotFound(u32),

    #[error("Scan already in progress: {0}")]
    ScanAlreadyInProgress(String),

    #[error("Scan {id} cannot {action} while {state}")]
    IllegalTransition {
        id: u64,
        action: &'static str,
        state: String,
    },

    #[error("Illegal policy name: {0}")]
    IllegalPolicyName(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
