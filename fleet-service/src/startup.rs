//! Process wiring: store, token service, edge hub and HTTP listener.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use service_core::error::AppError;
use tokio::net::TcpListener;

use crate::config::FleetConfig;
use crate::services::{ChannelHub, FleetDb, JwtService};
use crate::{build_router, AppState};

/// A bound, fully wired fleet-service instance.
pub struct Application {
    port: u16,
    listener: TcpListener,
    hub: Arc<ChannelHub>,
    state: AppState,
}

impl Application {
    /// Connects to MongoDB, prepares indexes and binds the listener.
    pub async fn build(config: FleetConfig) -> Result<Self, AppError> {
        let db = FleetDb::connect(&config.mongodb.uri, &config.mongodb.database)
            .await
            .map_err(|e| {
                tracing::error!("Failed to connect to MongoDB: {}", e);
                e
            })?;

        db.initialize_indexes().await.map_err(|e| {
            tracing::error!("Failed to initialize database indexes: {}", e);
            e
        })?;

        let jwt = JwtService::new(&config.jwt).map_err(|e| {
            tracing::error!("Failed to initialize JWT service: {}", e);
            AppError::ConfigError(e)
        })?;

        let hub = Arc::new(ChannelHub::new(&config.messaging));
        let db = Arc::new(db);

        // Port 0 binds an ephemeral port.
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        let state = AppState::new(config, db.clone(), db, hub.clone(), jwt);
        tracing::info!(
            port = port,
            hostname = %state.config.hostname,
            "Fleet service listening"
        );

        Ok(Self {
            port,
            listener,
            hub,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Edge channel registry, for transport adapters.
    pub fn hub(&self) -> Arc<ChannelHub> {
        self.hub.clone()
    }

    /// Serve until `shutdown` resolves.
    pub async fn run_until_stopped<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = build_router(self.state);
        axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| {
                tracing::error!("HTTP server error: {}", e);
                std::io::Error::other(format!("HTTP server error: {}", e))
            })
    }
}
