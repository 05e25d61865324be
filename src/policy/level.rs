use serde::{Deserialize, Serialize};
use std::str::FromStr;
use crate::errors::ScanError;

/// How confident a scanner must be before it raises a finding. `Off` disables it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertThreshold {
    Off,
    Low,
    #[default]
    Medium,
    High,
}

impl AlertThreshold {
    pub const ALL: [AlertThreshold; 4] = [Self::Off, Self::Low, Self::Medium, Self::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl std::fmt::Display for AlertThreshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertThreshold {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OFF" => Ok(Self::Off),
            "LOW" => Ok(Self::Low),
            "MEDIUM" | "DEFAULT" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            other => Err(ScanError::InvalidRequest(format!("Unknown alert threshold: {}", other))),
        }
    }
}

/// How many request variations a scanner is allowed to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttackStrength {
    Low,
    #[default]
    Medium,
    High,
    Insane,
}

impl AttackStrength {
    pub const ALL: [AttackStrength; 4] = [Self::Low, Self::Medium, Self::High, Self::Insane];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Insane => "INSANE",
        }
    }
}

impl std::fmt::Display for AttackStrength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttackStrength {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" | "DEFAULT" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "INSANE" => Ok(Self::Insane),
            other => Err(ScanError::InvalidRequest(format!("Unknown attack strength: {}", other))),
        }
    }
}

/// Result of asking what a whole category is set to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum CategorySetting<T> {
    /// Every scanner in the category agrees.
    Uniform(T),
    /// Scanners in the category disagree.
    Mixed,
    /// The category has no scanners.
    Empty,
}

impl<T: PartialEq + Copy> CategorySetting<T> {
    /// Fold an iterator of per-scanner values into a category-level answer.
    pub fn collect<I: IntoIterator<Item = T>>(values: I) -> Self {
        let mut result = CategorySetting::Empty;
        for value in values {
            result = match result {
                CategorySetting::Empty => CategorySetting::Uniform(value),
                CategorySetting::Uniform(current) if current == value => CategorySetting::Uniform(current),
                _ => return CategorySetting::Mixed,
            };
        }
        result
    }

    pub fn uniform(&self) -> Option<T> {
        match self {
            CategorySetting::Uniform(v) => Some(*v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_parse_case_insensitive() {
        assert_eq!("off".parse::<AlertThreshold>().unwrap(), AlertThreshold::Off);
        assert_eq!("High".parse::<AlertThreshold>().unwrap(), AlertThreshold::High);
        assert!("extreme".parse::<AlertThreshold>().is_err());
    }

    #[test]
    fn test_strength_parse() {
        assert_eq!("insane".parse::<AttackStrength>().unwrap(), AttackStrength::Insane);
        assert_eq!("DEFAULT".parse::<AttackStrength>().unwrap(), AttackStrength::Medium);
        assert!("off".parse::<AttackStrength>().is_err());
    }

    #[test]
    fn test_defaults_are_medium() {
        assert_eq!(AlertThreshold::default(), AlertThreshold::Medium);
        assert_eq!(AttackStrength::default(), AttackStrength::Medium);
    }

    #[test]
    fn test_serialization_uses_uppercase_names() {
        assert_eq!(serde_json::to_string(&AlertThreshold::Low).unwrap(), "\"LOW\"");
        assert_eq!(serde_json::to_string(&AttackStrength::Insane).unwrap(), "\"INSANE\"");
    }

    #[test]
    fn test_category_setting_uniform() {
        let setting = CategorySetting::collect(vec![AlertThreshold::Low, AlertThreshold::Low]);
        assert_eq!(setting, CategorySetting::Uniform(AlertThreshold::Low));
        assert_eq!(setting.uniform(), Some(AlertThreshold::Low));
    }

    #[test]
    fn test_category_setting_mixed() {
        let setting = CategorySetting::collect(vec![AttackStrength::Low, AttackStrength::High]);
        assert_eq!(setting, CategorySetting::Mixed);
        assert_eq!(setting.uniform(), None);
    }

    #[test]
    fn test_category_setting_empty_is_not_mixed() {
        let setting: CategorySetting<AlertThreshold> = CategorySetting::collect(Vec::new());
        assert_eq!(setting, CategorySetting::Empty);
        assert_ne!(setting, CategorySetting::Mixed);
    }
}
