//! API server — HTTP router, middleware stack, and the metrics exporter.

use crate::rest::{self, AppState};
use crate::terminal_rest::{self, TerminalState};
use axum::routing::{get, patch, post};
use axum::Router;
use promo_core::config::AppConfig;
use promo_engine::{RedemptionTerminal, ScratchEngine};
use promo_store::CouponStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// HTTP REST server for the promotion service.
pub struct ApiServer {
    config: AppConfig,
    store: Arc<dyn CouponStore>,
    engine: Arc<ScratchEngine>,
    terminal: Arc<RedemptionTerminal>,
}

impl ApiServer {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn CouponStore>,
        engine: Arc<ScratchEngine>,
        terminal: Arc<RedemptionTerminal>,
    ) -> Self {
        Self {
            config,
            store,
            engine,
            terminal,
        }
    }

    pub fn router(&self) -> Router {
        let state = AppState {
            store: self.store.clone(),
            engine: self.engine.clone(),
            node_id: self.config.node_id.clone(),
            start_time: Instant::now(),
        };
        let terminal_state = TerminalState {
            terminal: self.terminal.clone(),
        };

        Router::new()
            // Customer registration and lookup
            .route("/v1/customers/register", post(rest::handle_register))
            .route("/v1/customers", get(rest::handle_customers))
            .route("/v1/customers/:id/history", get(rest::handle_history))
            // Scratch draws
            .route("/v1/draws", post(rest::handle_draw))
            .route("/v1/draws/:code/reveal", post(rest::handle_reveal))
            // Offer administration
            .route(
                "/v1/offers",
                get(rest::handle_list_offers).post(rest::handle_create_offer),
            )
            .route("/v1/offers/:id/status", patch(rest::handle_offer_status))
            // Operational endpoints
            .route("/health", get(rest::health_check))
            .route("/ready", get(rest::readiness))
            .route("/live", get(rest::liveness))
            .with_state(state)
            // Staff terminal
            .merge(
                Router::new()
                    .route(
                        "/v1/terminal/validate/:code",
                        get(terminal_rest::handle_validate),
                    )
                    .route("/v1/terminal/redeem", post(terminal_rest::handle_redeem))
                    .with_state(terminal_state),
            )
            // Middleware
            .layer(CompressionLayer::new())
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
    }

    /// Start the HTTP REST server. Blocks until shutdown.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let app = self.router();

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the metrics server on a separate port.
    pub async fn start_metrics(&self) -> anyhow::Result<()> {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
        let handle = builder
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install_recorder()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");

        // Keep the handle alive
        std::mem::forget(handle);
        Ok(())
    }
}
