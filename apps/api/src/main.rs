mod billing;
mod config;
mod errors;
mod models;
mod navigation;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::billing::{Catalog, HttpBillingGateway};
use crate::config::Config;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Entitlement API v{}", env!("CARGO_PKG_VERSION"));

    // Validate the catalog: mismatched promo prices are flagged, broken invariants stop startup
    let catalog = Catalog::standard();
    let defects = catalog.validate();
    for defect in defects.iter().filter(|d| !d.is_fatal()) {
        warn!("Catalog {}: {defect}", catalog.version);
    }
    let fatal: Vec<String> = defects
        .iter()
        .filter(|d| d.is_fatal())
        .map(|d| d.to_string())
        .collect();
    if !fatal.is_empty() {
        bail!("Catalog {} is invalid: {}", catalog.version, fatal.join("; "));
    }
    info!(
        "Catalog {} loaded: {} AI plans, {} recruiter plans, {} credit packages",
        catalog.version,
        catalog.ai_plans.len(),
        catalog.recruiter_plans.len(),
        catalog.credit_packages.len()
    );

    // Validate navigation tables
    if let Err(problems) = navigation::validate_tables() {
        bail!("Navigation tables are invalid: {}", problems.join("; "));
    }

    // Initialize billing backend client
    let gateway = HttpBillingGateway::new(&config.billing_api_url, config.billing_api_timeout())?;
    info!(
        "Billing client initialized ({}, timeout {}s)",
        config.billing_api_url, config.billing_api_timeout_secs
    );

    // Build app state
    let state = AppState {
        config: config.clone(),
        catalog: Arc::new(catalog),
        gateway: Arc::new(gateway),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict CORS to the SPA origin

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
