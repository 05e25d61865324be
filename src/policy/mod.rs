pub mod catalog;
pub mod level;
pub mod manager;
pub mod scan_policy;

pub use catalog::{Category, PluginCatalog, PluginDefinition, PluginId};
pub use level::{AlertThreshold, AttackStrength, CategorySetting};
pub use manager::{validate_name, PolicyManager, DEFAULT_POLICY_NAME, POLICY_EXTENSION};
pub use scan_policy::{ModuleState, Policy, PolicyDocument};
