// One-shot forecast for a single column
//
// Runs the full pipeline against a local CSV and prints each emission as a
// JSON line on stdout. Logs go to stderr.
// Usage: cargo run --bin forecast_column -- --dataset data.csv --column Copper

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use mining_forecast_rust::{
    CancelFlag, CsvDatasetProvider, ForecastConfig, JsonFileWeights, PipelineOrchestrator,
    PipelineOutcome, ReportSummaryAdvisory, UniformWeights, WeightProvider,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// CSV file with one column per mineral
    #[arg(long)]
    dataset: PathBuf,

    /// Column to train the forecasting model on
    #[arg(long)]
    column: String,

    /// Forecast configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Mineral weight map (JSON object)
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Seed for synthetic signals and model training
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mining_forecast_rust=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ForecastConfig::load(path)?,
        None => ForecastConfig::default(),
    };
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    let weights: Arc<dyn WeightProvider> = match args.weights {
        Some(path) => Arc::new(JsonFileWeights::new(path)),
        None => Arc::new(UniformWeights),
    };

    let orchestrator = PipelineOrchestrator::new(
        config,
        Arc::new(CsvDatasetProvider::new(args.dataset)),
        weights,
        Arc::new(ReportSummaryAdvisory),
    )
    .context("Invalid forecast configuration")?;

    let outcome = orchestrator.process(&args.column, &CancelFlag::new());
    let failed = matches!(outcome, PipelineOutcome::Errored { .. });

    for emission in outcome.into_emissions() {
        println!("{}", serde_json::to_string(&emission)?);
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
