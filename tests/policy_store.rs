use ascan::policy::{AlertThreshold, AttackStrength, Category, CategorySetting, PluginCatalog, PolicyManager};
use std::sync::Arc;
use tempfile::TempDir;

fn store(dir: &TempDir, sub: &str) -> PolicyManager {
    PolicyManager::new(dir.path().join(sub), Arc::new(PluginCatalog::builtin()))
}

#[test]
fn test_export_and_import_between_stores() {
    let dir = TempDir::new().unwrap();
    let source = store(&dir, "a");
    let mut policy = source.new_policy("Quick");
    policy.set_category_threshold(Category::Server, AlertThreshold::Off);
    policy.set_category_strength(Category::Injection, AttackStrength::Insane);
    source.save(&policy).unwrap();

    let file = dir.path().join("out").join("quick.policy");
    source.export_to(&source.load("Quick").unwrap(), &file).unwrap();

    let target = store(&dir, "b");
    let imported = target.import_from(&file).unwrap();
    assert_eq!(imported.name(), "Quick");
    assert_eq!(imported.category_threshold(Category::Server), CategorySetting::Uniform(AlertThreshold::Off));
    assert_eq!(
        imported.category_strength(Category::Injection),
        CategorySetting::Uniform(AttackStrength::Insane)
    );

    let again = target.import_from(&file).unwrap();
    assert_eq!(again.name(), "Quick2");
    assert!(target.list_names().unwrap().contains(&"Quick2".to_string()));
}

#[test]
fn test_attack_policy_falls_back_to_first_stored() {
    let dir = TempDir::new().unwrap();
    let manager = store(&dir, "p").with_preferred_names("Scans", "Missing");
    let names = manager.list_names().unwrap();
    assert_eq!(names, vec!["Scans".to_string()]);
    assert_eq!(manager.resolve_default().name(), "Scans");
    assert_eq!(manager.resolve_attack().name(), "Scans");
}

#[test]
fn test_delete_missing_policy_reports_false() {
    let dir = TempDir::new().unwrap();
    let manager = store(&dir, "p");
    manager.save(&manager.new_policy("Gone")).unwrap();
    assert!(manager.delete("Gone").unwrap());
    assert!(!manager.delete("Gone").unwrap());
    assert!(manager.load("Gone").is_err());
}
