use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use crate::api::{self, AppState};
use crate::attack::AttackModeScheduler;
use crate::cli::commands::ServeArgs;
use crate::cli::policy::{build_catalog, build_policy_manager};
use crate::config::load_config;
use crate::controller::{LogFindingSink, ScanController, ScanOptions};
use crate::engine::DryRunEngineFactory;
use crate::errors::ScanError;
use crate::topology::MemorySiteTree;
use tracing::info;

pub async fn handle_serve(args: ServeArgs) -> Result<(), ScanError> {
    let config = load_config(args.config.as_deref().map(Path::new)).await?;
    let scanner = config.scanner();
    let api_config = config.api();

    let catalog = Arc::new(build_catalog(&scanner)?);
    let policies = Arc::new(build_policy_manager(&scanner, catalog, None));
    let names = policies.list_names()?;
    info!(dir = %policies.dir().display(), policies = names.len(), "Policy store opened");

    let tree = Arc::new(MemorySiteTree::new());
    let factory = Arc::new(
        DryRunEngineFactory::new(tree.clone()).with_step_delay(Duration::from_millis(args.step_delay_ms)),
    );
    let options = Arc::new(ScanOptions::with_exclusions(scanner.excluded_urls())?);
    let controller = Arc::new(
        ScanController::new(tree.clone(), factory.clone(), options).with_finding_sink(Arc::new(LogFindingSink)),
    );
    let attack = Arc::new(AttackModeScheduler::new(
        tree.clone(),
        factory,
        policies.resolve_attack(),
        config.attack_mode().to_runtime(),
        None,
    ));

    let state = AppState::new(controller.clone(), policies, attack.clone(), tree);
    let app = api::build_router(state);

    let host = args.host.unwrap_or_else(|| api_config.host().to_string());
    let port = args.port.unwrap_or_else(|| api_config.port());
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ScanError::Internal(format!("Server error: {}", e)))?;

    attack.stop().await;
    let stopped = controller.stop_all();
    info!(stopped, "Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
