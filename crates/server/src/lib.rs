//! leakygate server library.
//!
//! Provides a reusable server function to serve leakygate either for the binary, or for the integration tests.

#![deny(missing_docs)]

mod admission;
mod client_identity;
mod health;
mod request_id;

use std::net::SocketAddr;
use std::sync::Arc;

use admission::AdmissionLayer;
use anyhow::anyhow;
use axum::{Json, Router, routing::get};
use config::Config;
use rate_limit::{AdmissionController, ConfigurationError, Storage};
use serde_json::{Value, json};
use tokio::net::TcpListener;

pub use request_id::{REQUEST_ID_HEADER, RequestId};

/// Configuration for serving leakygate.
pub struct ServeConfig {
    /// The socket address (IP and port) the server will bind to
    pub listen_address: SocketAddr,
    /// The deserialized leakygate TOML configuration.
    pub config: Config,
}

/// Starts and runs the leakygate server with the provided configuration.
pub async fn serve(ServeConfig { listen_address, config }: ServeConfig) -> anyhow::Result<()> {
    let app = router(&config).await?;

    let listener = TcpListener::bind(listen_address)
        .await
        .map_err(|e| anyhow!("Failed to bind to {listen_address}: {e}"))?;

    log::info!(
        "Admission-controlled endpoint available at: http://{listen_address}{}",
        config.server.path
    );

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow!("Failed to start HTTP server: {e}"))?;

    Ok(())
}

/// Builds the application router.
///
/// With admission control enabled this connects to the bucket store, so any store or
/// configuration problem surfaces here, before a single request is served.
pub async fn router(config: &Config) -> anyhow::Result<Router> {
    let mut protected = Router::new().route(&config.server.path, get(hit_bucket));
    let rate_limits = &config.server.rate_limits;

    if rate_limits.enabled {
        for warning in config.validate()? {
            log::warn!("{warning}");
        }

        log::debug!(
            "Initializing admission control: {} tokens per {:?} for dimension '{}'",
            rate_limits.limit,
            rate_limits.duration,
            rate_limits.dimension
        );

        let storage = Storage::from_config(&rate_limits.storage)
            .await
            .map_err(ConfigurationError::Store)?;

        let controller = AdmissionController::new(
            Arc::new(storage),
            rate_limits.dimension.clone(),
            rate_limits.limit,
            rate_limits.duration,
        )?
        .with_namespace(rate_limits.namespace.clone());

        // Only matched routes are gated, unknown paths never touch a bucket.
        protected = protected.route_layer(AdmissionLayer::new(controller, rate_limits.source.clone()));
    } else {
        log::debug!("Admission control disabled - endpoint is unprotected");
    }

    let mut app = Router::new().merge(protected);

    // Health stays outside the admission layer.
    if config.server.health.enabled {
        app = app.route(&config.server.health.path, get(health::health));
    }

    Ok(app)
}

async fn hit_bucket() -> Json<Value> {
    Json(json!({ "msg": "hit bucket" }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }

    log::info!("Shutting down");
}
