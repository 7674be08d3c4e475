//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the business routes
//! - Wire up middleware (tracing, request ID, body limit, deadline, admission)
//! - Bind the main listener and, when enabled, the admin listener
//! - Start the admission metrics poller
//! - Drain on shutdown

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::admin::{setup_admin_router, AdminState};
use crate::admission::{admission_middleware, AdmissionController, CapacityConfig};
use crate::config::ServiceConfig;
use crate::http::deadline::{deadline_middleware, DeadlineState};
use crate::http::request::RequestIdLayer;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::routes;

/// HTTP server for the service.
pub struct HttpServer {
    config: ServiceConfig,
    controller: Arc<AdmissionController>,
    routes: Router,
}

impl HttpServer {
    /// Server exposing the built-in business routes.
    pub fn new(config: ServiceConfig) -> Self {
        Self::with_routes(config, routes::router())
    }

    /// Server exposing `routes` behind the admission middleware.
    pub fn with_routes(config: ServiceConfig, routes: Router) -> Self {
        let limits = CapacityConfig::from(&config.admission);
        let controller = Arc::new(AdmissionController::with_tracing(limits));
        Self {
            config,
            controller,
            routes,
        }
    }

    pub fn controller(&self) -> &Arc<AdmissionController> {
        &self.controller
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Main router with the full middleware stack.
    pub fn router(&self, shutdown: &Shutdown) -> Router {
        build_router(
            &self.config,
            Arc::clone(&self.controller),
            self.routes.clone(),
            shutdown.token().clone(),
        )
    }

    pub fn admin_router(&self) -> Router {
        setup_admin_router(AdminState {
            controller: Arc::clone(&self.controller),
            api_key: Arc::from(self.config.admin.api_key.as_str()),
        })
    }

    /// Run the server until `shutdown` is triggered and in-flight
    /// connections have drained, or `timeouts.shutdown_ms` has passed.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: Shutdown,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let mut tasks = Vec::new();

        if self.config.admin.enabled {
            let admin_listener = TcpListener::bind(&self.config.admin.bind_address).await?;
            tracing::info!(address = %admin_listener.local_addr()?, "Admin API listening");

            let app = self.admin_router();
            let signal = shutdown.clone();
            tasks.push(tokio::spawn(async move {
                let result = axum::serve(admin_listener, app)
                    .with_graceful_shutdown(async move { signal.cancelled().await })
                    .await;
                if let Err(err) = result {
                    tracing::error!(error = %err, "Admin API stopped with error");
                }
            }));
        }

        if self.config.observability.metrics_enabled {
            tasks.push(metrics::spawn_admission_poller(
                Arc::clone(&self.controller),
                Duration::from_millis(self.config.observability.metrics_poll_ms),
                shutdown.token().clone(),
            ));
        }

        let app = self.router(&shutdown);
        let signal = shutdown.clone();
        let serve = axum::serve(listener, app)
            .with_graceful_shutdown(async move { signal.cancelled().await })
            .into_future();
        tokio::pin!(serve);

        tokio::select! {
            result = &mut serve => result?,
            () = shutdown.cancelled() => {
                let drain = Duration::from_millis(self.config.timeouts.shutdown_ms);
                match tokio::time::timeout(drain, &mut serve).await {
                    Ok(result) => result?,
                    Err(_) => tracing::warn!(
                        drain_ms = self.config.timeouts.shutdown_ms,
                        "Drain timed out, abandoning running requests"
                    ),
                }
            }
        }

        // Stop the auxiliary tasks even if serve returned on its own.
        shutdown.trigger();
        for task in tasks {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "Background task ended abnormally");
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Wrap `routes` in the request pipeline.
///
/// Outermost first: trace, request ID, body limit, deadline, admission.
pub fn build_router(
    config: &ServiceConfig,
    controller: Arc<AdmissionController>,
    routes: Router,
    shutdown: CancellationToken,
) -> Router {
    let deadline = DeadlineState {
        timeout: Some(Duration::from_millis(config.timeouts.request_ms)),
        shutdown,
    };

    routes
        .layer(middleware::from_fn_with_state(controller, admission_middleware))
        .layer(middleware::from_fn_with_state(deadline, deadline_middleware))
        .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
        .layer(RequestIdLayer)
        .layer(TraceLayer::new_for_http())
}
