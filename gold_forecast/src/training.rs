//! One-shot training pipeline: fetch history, label it, fit, persist.

use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use market_data_ingestor::{
    models::{
        bar_series::BarSeries,
        request_params::{BarsRequestParams, Lookback, RequestSpan},
        timeframe::TimeFrame,
    },
    providers::DataProvider,
};
use tracing::{info, warn};

use crate::{
    artifact::{ModelArtifact, TrainingMetadata},
    config::{AppConfig, ConfigError},
    errors::ForecastError,
    features::{HistoryReport, LabeledExample, PriceBar, design_matrix, prepare_examples},
    forest::{ForestParams, RandomForest},
};

/// Everything a training run needs besides the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainerSettings {
    pub symbol: String,
    pub lookback: Lookback,
    pub timeframe: TimeFrame,
    /// Below this many labelled examples the run aborts without writing.
    pub min_examples: usize,
    pub params: ForestParams,
    pub model_path: PathBuf,
}

impl TrainerSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            symbol: config.market.symbol.clone(),
            lookback: config.history_lookback()?,
            timeframe: config.history_timeframe()?,
            min_examples: config.model.min_examples,
            params: config.forest_params(),
            model_path: config.model.path.clone(),
        })
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub symbol: String,
    pub n_examples: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub model_path: PathBuf,
    /// Mean absolute error of the fitted forest on its own training rows.
    pub in_sample_mae: f64,
    pub history: HistoryReport,
}

/// Fits a forest on `examples` and wraps it as an artifact.
///
/// Returns the artifact and its in-sample mean absolute error. Fails with
/// [`ForecastError::InsufficientHistory`] before fitting anything when fewer
/// than `min_examples` (and never fewer than one) examples are given.
pub fn train_model(
    examples: &[LabeledExample],
    symbol: &str,
    params: &ForestParams,
    min_examples: usize,
) -> Result<(ModelArtifact, f64), ForecastError> {
    let required = min_examples.max(1);
    let (first, last) = match (examples.first(), examples.last()) {
        (Some(first), Some(last)) if examples.len() >= required => (first, last),
        _ => {
            return Err(ForecastError::InsufficientHistory {
                symbol: symbol.to_string(),
                found: examples.len(),
                required,
            });
        }
    };

    let (x, y) = design_matrix(examples);
    let forest = RandomForest::fit(&x, &y, params)?;

    let mut abs_error = 0.0;
    for (row, target) in x.iter().zip(&y) {
        abs_error += (forest.predict(row)? - target).abs();
    }
    let in_sample_mae = abs_error / y.len() as f64;

    let metadata = TrainingMetadata {
        symbol: symbol.to_string(),
        first_date: first.date,
        last_date: last.date,
        n_examples: examples.len(),
        trained_at: Utc::now(),
        params: params.clone(),
        crate_version: env!("CARGO_PKG_VERSION").to_string(),
    };
    Ok((ModelArtifact::new(forest, metadata), in_sample_mae))
}

/// Drives a training run against a [`DataProvider`].
pub struct Trainer<P> {
    provider: P,
    settings: TrainerSettings,
}

impl<P: DataProvider> Trainer<P> {
    pub fn new(provider: P, settings: TrainerSettings) -> Self {
        Self { provider, settings }
    }

    pub fn settings(&self) -> &TrainerSettings {
        &self.settings
    }

    /// Runs the full pipeline. The model file is only touched once fitting
    /// has succeeded.
    pub async fn run(&self) -> Result<TrainingReport, ForecastError> {
        let settings = &self.settings;
        info!(
            symbol = %settings.symbol,
            lookback = %settings.lookback,
            interval = %settings.timeframe,
            "fetching price history"
        );

        let series = self.fetch_history().await?;
        let (examples, history) = prepare_examples(PriceBar::from_series(&series));
        info!(
            bars = history.input_bars,
            examples = examples.len(),
            "labelled examples built"
        );

        let (artifact, in_sample_mae) = train_model(
            &examples,
            &settings.symbol,
            &settings.params,
            settings.min_examples,
        )?;
        info!(
            trees = artifact.forest.n_trees(),
            mae = in_sample_mae,
            "forest fitted"
        );

        artifact.save(&settings.model_path)?;

        Ok(TrainingReport {
            symbol: settings.symbol.clone(),
            n_examples: artifact.metadata.n_examples,
            first_date: artifact.metadata.first_date,
            last_date: artifact.metadata.last_date,
            model_path: settings.model_path.clone(),
            in_sample_mae,
            history,
        })
    }

    async fn fetch_history(&self) -> Result<BarSeries, ForecastError> {
        let symbol = &self.settings.symbol;
        let params = BarsRequestParams {
            symbols: vec![symbol.clone()],
            timeframe: self.settings.timeframe.clone(),
            span: RequestSpan::Lookback(self.settings.lookback),
        };
        let mut all = self.provider.fetch_bars(params).await?;

        let position = all.iter().position(|s| &s.symbol == symbol).or_else(|| {
            if all.len() == 1 {
                warn!(requested = %symbol, returned = %all[0].symbol, "provider renamed the symbol");
                Some(0)
            } else {
                None
            }
        });
        match position {
            Some(index) if !all[index].is_empty() => Ok(all.swap_remove(index)),
            _ => Err(ForecastError::NoData {
                symbol: symbol.clone(),
            }),
        }
    }
}
