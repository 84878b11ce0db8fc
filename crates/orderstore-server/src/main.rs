//! Main entry point for the orderstore server.
//!
//! Loads configuration, provisions the selected storage backend, verifies it
//! is reachable, optionally seeds sample orders and then runs until Ctrl+C or
//! SIGTERM.

use anyhow::Context;
use orderstore_server::{
    model::Configuration,
    startup::{self, Storage},
};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let configuration = Configuration::new()?;

    let logging_config = configuration.logging_config();
    let _logging_guard = startup::init_logging(&logging_config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    let storage = match Storage::from_configuration(&configuration).await {
        Ok(storage) => storage,
        Err(e) => {
            error!(error = %e, "Storage provisioning failed");
            return Err(e).context("storage provisioning failed");
        }
    };

    let service = storage.service();
    if let Err(e) = service.health_check().await {
        error!(backend = %storage.backend(), error = %e, "Storage backend is unreachable");
        return Err(e).context("storage health check failed");
    }
    info!(backend = %storage.backend(), "Storage backend ready");
    drop(service);

    if configuration.seed_enabled() {
        let count = startup::seed_orders(&storage)
            .await
            .context("seeding sample orders failed")?;
        info!(count, "Sample orders written");
    }

    let shutdown = startup::listen_for_shutdown_signal();
    startup::wait_for_shutdown(&shutdown).await;

    match startup::run_with_timeout(storage.shutdown(), configuration.shutdown_timeout()).await {
        Some(Ok(())) => info!("Shutdown complete"),
        Some(Err(e)) => error!(error = %e, "Failed to release storage"),
        None => error!("Storage did not shut down in time"),
    }

    Ok(())
}
