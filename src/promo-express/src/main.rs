//! Promo Express — restaurant scratch-card loyalty promotion service.
//!
//! Main entry point that wires the store, engine, and terminal behind the
//! REST API server.

use chrono::{Duration, Utc};
use clap::Parser;
use promo_api::ApiServer;
use promo_core::config::AppConfig;
use promo_core::types::{OfferDraft, OfferTargeting};
use promo_engine::{RedemptionTerminal, ScratchEngine};
use promo_store::{CouponStore, MemoryStore};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "promo-express")]
#[command(about = "Restaurant scratch-card loyalty promotion service")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "PROMO_EXPRESS__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "PROMO_EXPRESS__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Metrics port (overrides config)
    #[arg(long, env = "PROMO_EXPRESS__METRICS__PORT")]
    metrics_port: Option<u16>,

    /// Coupon validity in minutes (overrides config)
    #[arg(long, env = "PROMO_EXPRESS__PROMO__VALIDITY_MINUTES")]
    validity_minutes: Option<i64>,

    /// Seed a demo offer set on startup (development only)
    #[arg(long, default_value_t = false)]
    seed_demo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "promo_express=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Promo Express starting up");

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(port) = cli.metrics_port {
        config.metrics.port = port;
    }
    if let Some(minutes) = cli.validity_minutes {
        config.promo.validity_minutes = minutes;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        metrics_port = config.metrics.port,
        validity_minutes = config.promo.validity_minutes,
        "Configuration loaded"
    );

    // Wire the store, draw engine, and redemption terminal
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new(&config.promo));
    let engine = Arc::new(ScratchEngine::new(store.clone(), &config.promo));
    let terminal = Arc::new(RedemptionTerminal::new(store.clone()));

    if cli.seed_demo {
        seed_demo_offers(store.as_ref())?;
        info!(offers = store.offer_count(), "Demo offers seeded");
    }

    // Start API server
    let api_server = ApiServer::new(config, store, engine, terminal);

    // Start metrics exporter
    if let Err(e) = api_server.start_metrics().await {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("Promo Express is ready to serve traffic");

    // Start HTTP server (blocks until shutdown)
    api_server.start_http().await?;

    Ok(())
}

/// The classic demo weight split: {50, 30, 15, 5}.
fn seed_demo_offers(store: &dyn CouponStore) -> anyhow::Result<()> {
    let now = Utc::now();
    let drafts = [
        ("10% OFF", "10% off your total bill", 50, OfferTargeting::All),
        ("20% OFF", "20% off your total bill", 30, OfferTargeting::All),
        (
            "Free Dessert",
            "A dessert of your choice, on the house",
            15,
            OfferTargeting::Frequent,
        ),
        (
            "50% OFF",
            "Half price, welcome back",
            5,
            OfferTargeting::Inactive,
        ),
    ];

    for (title, description, weight, targeting) in drafts {
        store.create_offer(
            OfferDraft {
                title: title.to_string(),
                description: description.to_string(),
                weight,
                targeting,
                starts_at: now,
                ends_at: now + Duration::days(30),
            },
            now,
        )?;
    }
    Ok(())
}
