// API Server Binary Entry Point
//
// Purpose: Start the Axum session server in front of the forecasting pipeline
// Usage: cargo run --features api --bin api_server

use anyhow::Context;
use mining_forecast_rust::api_server::{create_router, AppState};
use mining_forecast_rust::{
    CsvDatasetProvider, DatasetProvider, DisabledAdvisory, FallbackDatasetProvider,
    ForecastConfig, JsonFileWeights, PipelineOrchestrator, ReportSummaryAdvisory,
    UniformWeights, WeightProvider,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing (structured logging)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    // Default log level: info for our crate, warn for others
                    "mining_forecast_rust=info,tower_http=debug,axum=debug,warn".into()
                }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting API server...");

    // Configuration from environment variables
    let dataset_path = std::env::var("DATASET_PATH")
        .unwrap_or_else(|_| "data/soil_minerals.csv".to_string());
    let fallback_path = std::env::var("FALLBACK_DATASET_PATH").ok();
    let config_path = std::env::var("FORECAST_CONFIG").ok();
    let weights_path = std::env::var("WEIGHTS_PATH").ok();
    let advisory_enabled = std::env::var("ADVISORY")
        .map(|v| v != "off")
        .unwrap_or(true);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let session_idle_secs: u64 = std::env::var("SESSION_IDLE_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1800);

    tracing::info!("Configuration:");
    tracing::info!("  DATASET_PATH: {}", dataset_path);
    tracing::info!("  FALLBACK_DATASET_PATH: {:?}", fallback_path);
    tracing::info!("  FORECAST_CONFIG: {:?}", config_path);
    tracing::info!("  WEIGHTS_PATH: {:?}", weights_path);
    tracing::info!("  PORT: {}", port);
    tracing::info!("  SESSION_IDLE_SECS: {}", session_idle_secs);

    let config = match &config_path {
        Some(path) => ForecastConfig::load(Path::new(path))?,
        None => ForecastConfig::default(),
    };

    // Collaborators
    let primary: Arc<dyn DatasetProvider> = Arc::new(CsvDatasetProvider::new(&dataset_path));
    let dataset: Arc<dyn DatasetProvider> = match fallback_path {
        Some(path) => Arc::new(FallbackDatasetProvider::new(
            primary,
            Arc::new(CsvDatasetProvider::new(path)),
        )),
        None => primary,
    };

    let weights: Arc<dyn WeightProvider> = match weights_path {
        Some(path) => Arc::new(JsonFileWeights::new(path)),
        None => Arc::new(UniformWeights),
    };

    let orchestrator = if advisory_enabled {
        PipelineOrchestrator::new(config, dataset, weights, Arc::new(ReportSummaryAdvisory))
    } else {
        PipelineOrchestrator::new(config, dataset, weights, Arc::new(DisabledAdvisory))
    }
    .context("Invalid forecast configuration")?;

    let state = AppState::new(orchestrator, Duration::from_secs(session_idle_secs));
    tracing::info!("Application state initialized successfully");

    // Create router with all endpoints and middleware
    let app = create_router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
