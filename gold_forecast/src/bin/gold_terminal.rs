use std::{io, path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use gold_forecast::{
    artifact::ArtifactError,
    config::AppConfig,
    inference::{MarketInputs, ModelHandle},
    logging::setup_logger,
    terminal::{
        Edit, LiveFeed, parse_amount, render_inputs, render_report, run_interactive,
        run_prediction, sync_live_data,
    },
};
use market_data_ingestor::providers::yahoo_chart::YahooChartProvider;
use tracing::info;

#[derive(Parser)]
#[command(version, about = "Next-day gold price forecasts from a trained model")]
struct Cli {
    /// Path to the config file (gold_forecast.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    cmd: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run one prediction and exit
    Predict(PredictArgs),
    /// Read commands from stdin (the default)
    Interactive,
}

#[derive(Args)]
struct PredictArgs {
    /// Pull the latest live bar before applying the flags below
    #[arg(long)]
    sync: bool,

    /// Last traded price
    #[arg(long, value_parser = parse_amount)]
    close: Option<f64>,

    /// Opening tick
    #[arg(long, value_parser = parse_amount)]
    open: Option<f64>,

    /// Session high
    #[arg(long, value_parser = parse_amount)]
    high: Option<f64>,

    /// Session low
    #[arg(long, value_parser = parse_amount)]
    low: Option<f64>,

    /// 24h volume
    #[arg(long, value_parser = parse_amount)]
    volume: Option<f64>,

    /// Forecast date
    #[arg(long, value_name = "YYYY-MM-DD")]
    date: Option<NaiveDate>,
}

impl PredictArgs {
    fn edits(&self) -> Vec<Edit> {
        [
            self.close.map(Edit::LastPrice),
            self.open.map(Edit::Open),
            self.high.map(Edit::High),
            self.low.map(Edit::Low),
            self.volume.map(Edit::Volume),
            self.date.map(Edit::Date),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    setup_logger(&cli.log_level);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;

    // No degraded mode without a model: stop before touching anything else.
    let model = match ModelHandle::load(&config.model.path) {
        Ok(model) => model,
        Err(ArtifactError::NotFound { path }) => {
            eprintln!(
                "model artifact not found at {}; run gold-trainer first",
                path.display()
            );
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => {
            eprintln!("model artifact is unreadable: {e}; re-run gold-trainer");
            return Ok(ExitCode::FAILURE);
        }
    };
    let meta = model.metadata();
    info!(
        symbol = %meta.symbol,
        trained_at = %meta.trained_at,
        examples = meta.n_examples,
        "model loaded"
    );

    let provider = YahooChartProvider::with_config(config.yahoo_config())
        .context("building market data client")?;
    let feed = LiveFeed::from_config(&config)?;
    let mut inputs = MarketInputs::with_defaults(Local::now().date_naive());

    match cli.cmd.unwrap_or(Cmd::Interactive) {
        Cmd::Predict(args) => {
            if args.sync {
                let outcome = sync_live_data(&provider, &feed, inputs).await;
                eprintln!("{}", outcome.notice);
                inputs = outcome.inputs;
            }
            for edit in args.edits() {
                edit.apply(&mut inputs);
            }
            let report = run_prediction(&model, &inputs)?;
            println!("{}\n\n{}", render_inputs(&inputs), render_report(&report));
        }
        Cmd::Interactive => {
            let stdin = io::stdin();
            let mut stdout = io::stdout();
            run_interactive(&model, &provider, &feed, inputs, stdin.lock(), &mut stdout).await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
