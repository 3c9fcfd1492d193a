use market_data_ingestor::providers::ProviderError;
use thiserror::Error;

use crate::{artifact::ArtifactError, config::ConfigError, forest::ForestError};

/// The unified error type for the `gold_forecast` crate.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Loading or saving the model artifact failed.
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    /// The regressor rejected its input.
    #[error(transparent)]
    Forest(#[from] ForestError),

    /// An error originating from the market data provider.
    #[error("market data provider failed: {0}")]
    Provider(#[from] ProviderError),

    /// The provider answered but had no bars for the symbol.
    #[error("no price data returned for {symbol}")]
    NoData { symbol: String },

    /// Too little history to fit a meaningful model. Nothing was written.
    #[error("only {found} labelled examples for {symbol}, need at least {required}")]
    InsufficientHistory {
        symbol: String,
        found: usize,
        required: usize,
    },

    /// An error related to configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
