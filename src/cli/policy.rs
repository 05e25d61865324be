use std::path::{Path, PathBuf};
use std::sync::Arc;
use crate::cli::commands::{PolicyAction, PolicyArgs};
use crate::config::{load_config, ScannerConfig};
use crate::errors::ScanError;
use crate::policy::{Category, PluginCatalog, Policy, PolicyManager};
use crate::utils::formatting::{category_line, scanner_line};
use tracing::info;

/// Built-in plugins plus any definitions found in the configured plugin directory.
pub fn build_catalog(scanner: &ScannerConfig) -> Result<PluginCatalog, ScanError> {
    let mut catalog = PluginCatalog::builtin();
    if let Some(dir) = scanner.plugin_dir.as_deref() {
        let loaded = catalog.load_dir(Path::new(dir))?;
        info!(dir = %dir, loaded, total = catalog.len(), "Plugin catalog ready");
    }
    Ok(catalog)
}

pub fn build_policy_manager(
    scanner: &ScannerConfig,
    catalog: Arc<PluginCatalog>,
    dir_override: Option<&str>,
) -> PolicyManager {
    let dir = dir_override.map(PathBuf::from).unwrap_or_else(|| scanner.policy_dir());
    PolicyManager::new(dir, catalog)
        .with_preferred_names(scanner.default_policy(), scanner.attack_policy())
        .with_defaults(
            scanner.default_threshold.unwrap_or_default(),
            scanner.default_strength.unwrap_or_default(),
        )
}

pub async fn handle_policy(args: PolicyArgs) -> Result<(), ScanError> {
    let config = load_config(args.config.as_deref().map(Path::new)).await?;
    let scanner = config.scanner();
    let catalog = Arc::new(build_catalog(&scanner)?);
    let manager = build_policy_manager(&scanner, catalog, args.dir.as_deref());

    match args.action {
        PolicyAction::List => {
            let names = manager.list_names()?;
            if names.is_empty() {
                println!("No policies in {}", manager.dir().display());
            }
            for name in names {
                let marker = if name == manager.default_name() { " (default)" } else { "" };
                println!("{}{}", name, marker);
            }
        }
        PolicyAction::Show { name, json } => {
            let policy = manager.load(&name)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&policy.to_document())?);
            } else {
                print_policy(&policy);
            }
        }
        PolicyAction::Create { name } => {
            if manager.exists(&name) {
                return Err(ScanError::InvalidRequest(format!("Policy already exists: {}", name)));
            }
            let policy = manager.new_policy(&name);
            manager.save(&policy)?;
            println!("Created policy {}", policy.name());
        }
        PolicyAction::Import { file } => {
            let policy = manager.import_from(Path::new(&file))?;
            println!("Imported {} as {}", file, policy.name());
        }
        PolicyAction::Export { name, file } => {
            let policy = manager.load(&name)?;
            manager.export_to(&policy, Path::new(&file))?;
            println!("Exported {} to {}", name, file);
        }
        PolicyAction::Delete { name } => {
            if !manager.delete(&name)? {
                return Err(ScanError::PolicyNotFound(name));
            }
            println!("Deleted policy {}", name);
        }
    }
    Ok(())
}

fn print_policy(policy: &Policy) {
    println!(
        "{}  threshold={} strength={}",
        policy.name(),
        policy.default_threshold(),
        policy.default_strength()
    );
    for category in Category::ALL {
        println!(
            "  {}",
            category_line(category, &policy.category_threshold(category), &policy.category_strength(category))
        );
        for definition in policy.catalog().in_category(category) {
            if let Some(state) = policy.module_state(definition.id) {
                println!("    {}", scanner_line(definition, &state));
            }
        }
    }
}
