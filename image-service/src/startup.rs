//! Application startup and lifecycle management.
//!
//! `Application::build` binds the listener so a bind failure surfaces before
//! anything else runs; `run_until_stopped` serves until a termination signal
//! and drives the graceful shutdown.

use crate::config::{ImageServiceConfig, ProcessConfig};
use crate::handlers::{health_check, metrics_endpoint, process_image, readiness_check, root};
use crate::lifecycle::{Lifecycle, LifecycleHandle, ShutdownReport};
use axum::{
    middleware,
    routing::{any, get},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{metrics_middleware, request_id_middleware};
use service_core::shutdown::TerminationSignal;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service_name: Arc<str>,
    pub process: Arc<ProcessConfig>,
    pub lifecycle: LifecycleHandle,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", any(root))
        .route("/process-image", any(process_image))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_endpoint))
        // Any path without a route of its own gets the banner.
        .fallback(root)
        .route_layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    config: ImageServiceConfig,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: ImageServiceConfig) -> Result<Self, AppError> {
        // Bind HTTP listener (port 0 = random port for testing)
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(address = %addr, error = %e, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port, "Image service listening");

        Ok(Self {
            port,
            listener,
            config,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until a termination signal arrives on `signals`, then shut down
    /// gracefully.
    ///
    /// Returns an error only if the server stops on its own.
    pub async fn run_until_stopped(
        self,
        signals: mpsc::Receiver<TerminationSignal>,
    ) -> Result<ShutdownReport, AppError> {
        let lifecycle = Lifecycle::new(self.config.lifecycle.clone());
        let state = AppState {
            service_name: Arc::from(self.config.telemetry.service_name.as_str()),
            process: Arc::new(self.config.process.clone()),
            lifecycle: lifecycle.handle(),
        };
        let router = build_router(state);

        let stop = CancellationToken::new();
        let server = tokio::spawn({
            let stop = stop.clone();
            let listener = self.listener;
            async move {
                axum::serve(listener, router)
                    .with_graceful_shutdown(async move { stop.cancelled().await })
                    .await
            }
        });

        lifecycle.run(server, stop, signals).await
    }
}
