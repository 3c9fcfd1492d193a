use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use gold_forecast::{
    config::AppConfig,
    logging::setup_logger,
    training::{Trainer, TrainerSettings},
};
use market_data_ingestor::{
    models::request_params::Lookback, providers::yahoo_chart::YahooChartProvider,
};
use tracing::info;

#[derive(Parser)]
#[command(version, about = "Fetch daily gold futures history and train the next-day close model")]
struct Cli {
    /// Path to the config file (gold_forecast.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Instrument to train on, e.g. GC=F
    #[arg(long)]
    symbol: Option<String>,

    /// Training window, e.g. 10y or 6mo
    #[arg(long, value_name = "WINDOW")]
    lookback: Option<Lookback>,

    /// Where to write the model artifact
    #[arg(long, value_name = "PATH")]
    model_path: Option<PathBuf>,

    /// Number of trees in the ensemble
    #[arg(long)]
    trees: Option<usize>,

    /// Seed for bootstrap sampling
    #[arg(long)]
    seed: Option<u64>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    setup_logger(&cli.log_level);

    let mut config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(symbol) = cli.symbol {
        config.market.symbol = symbol;
    }
    if let Some(lookback) = cli.lookback {
        config.market.history_lookback = lookback.to_string();
    }
    if let Some(path) = cli.model_path {
        config.model.path = path;
    }
    if let Some(trees) = cli.trees {
        config.model.n_trees = trees;
    }
    if let Some(seed) = cli.seed {
        config.model.seed = seed;
    }
    config.validate().context("validating command-line overrides")?;

    let settings = TrainerSettings::from_config(&config)?;
    let provider = YahooChartProvider::with_config(config.yahoo_config())
        .context("building market data client")?;

    let report = Trainer::new(provider, settings)
        .run()
        .await
        .with_context(|| format!("training a model for {}", config.market.symbol))?;

    info!(
        symbol = %report.symbol,
        examples = report.n_examples,
        first = %report.first_date,
        last = %report.last_date,
        mae = report.in_sample_mae,
        path = %report.model_path.display(),
        "training complete"
    );
    println!(
        "trained on {} examples ({} to {}), in-sample MAE {:.2}, saved to {}",
        report.n_examples,
        report.first_date,
        report.last_date,
        report.in_sample_mae,
        report.model_path.display()
    );
    Ok(())
}
