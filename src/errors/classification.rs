use super::types::ScanError;

/// Broad failure families the callers of this crate react to differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown job, target, policy or scanner. Never fatal.
    NotFound,
    /// Request rejected before any mutation happened.
    Conflict,
    /// Policy or config storage could not be read or written.
    Persistence,
    /// Failures inside background work; logged and skipped by bulk operations.
    Background,
}

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    pub kind: ErrorKind,
}

impl ScanError {
    /// Classify this error into its type name and taxonomy family.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            ScanError::JobNotFound(_) => ErrorClassification {
                error_type: "JobNotFound",
                kind: ErrorKind::NotFound,
            },
            ScanError::TargetNotFound(_) => ErrorClassification {
                error_type: "TargetNotFound",
                kind: ErrorKind::NotFound,
            },
            ScanError::UrlNotFound(_) => ErrorClassification {
                error_type: "UrlNotFound",
                kind: ErrorKind::NotFound,
            },
            ScanError::PolicyNotFound(_) => ErrorClassification {
                error_type: "PolicyNotFound",
                kind: ErrorKind::NotFound,
            },
            ScanError::ScannerNotFound(_) => ErrorClassification {
                error_type: "ScannerNotFound",
                kind: ErrorKind::NotFound,
            },

            ScanError::ScanAlreadyInProgress(_) => ErrorClassification {
                error_type: "ScanInProgress",
                kind: ErrorKind::Conflict,
            },
            ScanError::IllegalTransition { .. } => ErrorClassification {
                error_type: "IllegalTransition",
                kind: ErrorKind::Conflict,
            },
            ScanError::IllegalPolicyName(_) => ErrorClassification {
                error_type: "IllegalPolicyName",
                kind: ErrorKind::Conflict,
            },
            ScanError::InvalidRequest(_) => ErrorClassification {
                error_type: "InvalidRequest",
                kind: ErrorKind::Conflict,
            },
            ScanError::Config(_) => ErrorClassification {
                error_type: "ConfigError",
                kind: ErrorKind::Conflict,
            },
            ScanError::Regex(_) => ErrorClassification {
                error_type: "RegexError",
                kind: ErrorKind::Conflict,
            },

            ScanError::Persistence(_) => ErrorClassification {
                error_type: "PersistenceError",
                kind: ErrorKind::Persistence,
            },
            ScanError::Io(_) => ErrorClassification {
                error_type: "IoError",
                kind: ErrorKind::Persistence,
            },
            ScanError::Json(_) => ErrorClassification {
                error_type: "JsonError",
                kind: ErrorKind::Persistence,
            },
            ScanError::Yaml(_) => ErrorClassification {
                error_type: "YamlError",
                kind: ErrorKind::Persistence,
            },

            ScanError::Internal(_) => ErrorClassification {
                error_type: "InternalError",
                kind: ErrorKind::Background,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.classify().kind == ErrorKind::NotFound
    }
}
