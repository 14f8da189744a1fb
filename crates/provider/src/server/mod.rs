mod routes;

use std::sync::Arc;

use axum::{routing::get, Router};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{config::ServerConfig, provider::EciProvider, Result};

/// Read-only HTTP view of the provider: health, pods, node and metrics.
pub struct Server {
    provider: Arc<EciProvider>,
    cancel: CancellationToken,
}

pub(crate) type AppState = Arc<Server>;

impl Server {
    pub fn new(provider: Arc<EciProvider>, cancel: CancellationToken) -> Self {
        Self { provider, cancel }
    }

    pub fn build_router(self) -> Router {
        let state = Arc::new(self);

        Router::new()
            .route("/health", get(routes::health))
            .route("/pods", get(routes::list_pods))
            .route("/pods/{namespace}/{name}", get(routes::get_pod))
            .route("/node", get(routes::node))
            .route("/metrics", get(routes::metrics))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Serve until `config`'s listener fails or the cancellation token fires.
    pub async fn serve(self, config: &ServerConfig) -> Result<()> {
        let shutdown = self.cancel.clone();
        let app = self.build_router();
        let listener = tokio::net::TcpListener::bind(&config.addr).await?;
        info!("Status server listening on {}", config.addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;
        Ok(())
    }
}
