use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cds_eci_provider::{
    cdsapi::ApiClient, config::Config, kubernetes::KubeResourceManager, metrics,
    provider::EciProvider, server::Server, Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::load()?;
    info!("Loaded configuration: {:?}", config);
    metrics::register_metrics();

    let resources = Arc::new(KubeResourceManager::try_default().await?);
    let client = ApiClient::new(Arc::new(config.api.clone()))?;
    let provider = Arc::new(EciProvider::new(client, config.node.clone(), resources));
    info!(
        node = %config.node.node_name,
        site = %config.node.site_id,
        "Provider ready"
    );

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
        shutdown.cancel();
    });

    Server::new(provider, cancel).serve(&config.server).await
}
