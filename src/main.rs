use anyhow::Result;
use ososync::api::{ApiClient, HttpConsumptionSource, HttpInstallationDirectory};
use ososync::auth::{CredentialRefresher, CredentialStore, HttpTokenExchange};
use ososync::importer::{ImportOrchestrator, ImportScheduler};
use ososync::store::{ConsumptionStore, ReadingReconciler};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ososync::Config::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    ososync::logging::init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Ososync consumption importer starting up");

    let mut store = ConsumptionStore::open(&config.database.path)
        .map_err(|e| anyhow::anyhow!("Failed to open consumption store: {}", e))?;
    store
        .migrate()
        .map_err(|e| anyhow::anyhow!("Failed to migrate consumption store: {}", e))?;

    let exchange = HttpTokenExchange::new(config.token.clone())
        .map_err(|e| anyhow::anyhow!("Failed to build token exchange: {}", e))?;
    let credentials = Arc::new(CredentialStore::new(
        Arc::new(exchange),
        config.token.freshness_factor,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Background credential refresh, independent of import traffic
    let refresher = CredentialRefresher::new(
        credentials.clone(),
        Duration::from_secs(config.token.refresh_interval_secs),
    );
    let refresher_task = tokio::spawn(refresher.run(shutdown_rx.clone()));

    let client = ApiClient::new(config.api.request_timeout_secs)
        .map_err(|e| anyhow::anyhow!("Failed to build API client: {}", e))?;
    let directory = HttpInstallationDirectory::new(client.clone(), config.api.clone());
    let source = HttpConsumptionSource::new(client, config.api.clone());
    let reconciler = ReadingReconciler::new(store, &config.import.distribution_company);
    let orchestrator = ImportOrchestrator::new(
        credentials,
        directory,
        source,
        reconciler,
        config.import.clone(),
    );
    let scheduler = ImportScheduler::new(orchestrator, config.import.clone());

    // ctrl-c flips the shutdown flag observed by every task
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    // The scheduler runs in the current task; the store is single-writer
    scheduler.run(shutdown_rx).await;

    let _ = refresher_task.await;

    info!("Ososync shutdown complete");
    Ok(())
}
