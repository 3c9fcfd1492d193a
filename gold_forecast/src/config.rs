//! Application configuration.
//!
//! Precedence, lowest first: built-in defaults, the TOML file, environment
//! overrides (`GOLD_FORECAST_*`), then whatever the binaries apply from
//! their command-line flags. Every field has a default, so running without
//! a config file is supported.
//!
//! ```toml
//! [market]
//! symbol = "GC=F"
//! history_lookback = "10y"
//!
//! [model]
//! path = "gold_model_live.bin"
//! n_trees = 100
//! ```

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use market_data_ingestor::{
    models::{request_params::Lookback, timeframe::TimeFrame},
    providers::yahoo_chart::{YahooChartConfig, provider::DEFAULT_BASE_URL},
};
use serde::{Deserialize, Serialize};
use shared_utils::env::{get_env_var, lookup_override};
use thiserror::Error;

use crate::forest::ForestParams;

pub const ENV_SYMBOL: &str = "GOLD_FORECAST_SYMBOL";
pub const ENV_MODEL_PATH: &str = "GOLD_FORECAST_MODEL_PATH";
pub const ENV_PROVIDER_URL: &str = "GOLD_FORECAST_PROVIDER_URL";

/// Errors related to application configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AppConfig {
    pub market: MarketConfig,
    pub provider: ProviderConfig,
    pub model: ModelConfig,
}

/// Which instrument to train on and how to fetch it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MarketConfig {
    pub symbol: String,
    /// Training window, e.g. `10y`.
    pub history_lookback: String,
    /// Training bar interval; the model is built for daily bars.
    pub history_interval: String,
    /// Window for the live sync, e.g. `1d` (the latest session).
    pub live_lookback: String,
    pub live_interval: String,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            symbol: "GC=F".to_string(),
            history_lookback: "10y".to_string(),
            history_interval: "1d".to_string(),
            live_lookback: "1d".to_string(),
            live_interval: "1m".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 10,
            max_retries: 1,
            retry_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ModelConfig {
    pub path: PathBuf,
    pub n_trees: usize,
    pub seed: u64,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: Option<usize>,
    /// Training aborts below this many labelled examples.
    pub min_examples: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let forest = ForestParams::default();
        Self {
            path: PathBuf::from("gold_model_live.bin"),
            n_trees: forest.n_trees,
            seed: forest.seed,
            max_depth: forest.max_depth,
            min_samples_split: forest.min_samples_split,
            min_samples_leaf: forest.min_samples_leaf,
            max_features: forest.max_features,
            min_examples: 30,
        }
    }
}

impl AppConfig {
    /// Reads `path` (or starts from defaults when `None`), then applies
    /// environment overrides and validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml_str(&raw, path)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| get_env_var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parses TOML; `path` only labels errors.
    pub fn from_toml_str(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies `GOLD_FORECAST_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(symbol) = lookup_override(ENV_SYMBOL, &lookup) {
            self.market.symbol = symbol;
        }
        if let Some(path) = lookup_override(ENV_MODEL_PATH, &lookup) {
            self.model.path = PathBuf::from(path);
        }
        if let Some(url) = lookup_override(ENV_PROVIDER_URL, &lookup) {
            self.provider.base_url = url;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.market.symbol.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "market.symbol",
                message: "must not be empty".into(),
            });
        }
        self.history_lookback()?;
        self.history_timeframe()?;
        self.live_lookback()?;
        self.live_timeframe()?;
        if self.provider.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "provider.timeout_secs",
                message: "must be at least 1".into(),
            });
        }
        if self.model.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "model.path",
                message: "must not be empty".into(),
            });
        }
        if self.model.n_trees == 0 {
            return Err(ConfigError::Invalid {
                field: "model.n_trees",
                message: "must be at least 1".into(),
            });
        }
        if self.model.min_examples == 0 {
            return Err(ConfigError::Invalid {
                field: "model.min_examples",
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    pub fn history_lookback(&self) -> Result<Lookback, ConfigError> {
        parse_field("market.history_lookback", &self.market.history_lookback)
    }

    pub fn history_timeframe(&self) -> Result<TimeFrame, ConfigError> {
        parse_field("market.history_interval", &self.market.history_interval)
    }

    pub fn live_lookback(&self) -> Result<Lookback, ConfigError> {
        parse_field("market.live_lookback", &self.market.live_lookback)
    }

    pub fn live_timeframe(&self) -> Result<TimeFrame, ConfigError> {
        parse_field("market.live_interval", &self.market.live_interval)
    }

    pub fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_trees: self.model.n_trees,
            seed: self.model.seed,
            max_depth: self.model.max_depth,
            min_samples_split: self.model.min_samples_split,
            min_samples_leaf: self.model.min_samples_leaf,
            max_features: self.model.max_features,
            bootstrap: true,
        }
    }

    pub fn yahoo_config(&self) -> YahooChartConfig {
        YahooChartConfig {
            base_url: self.provider.base_url.clone(),
            timeout: Duration::from_secs(self.provider.timeout_secs),
            max_retries: self.provider.max_retries,
            retry_delay: Duration::from_millis(self.provider.retry_delay_ms),
            ..YahooChartConfig::default()
        }
    }
}

fn parse_field<T>(field: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        field,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use market_data_ingestor::models::timeframe::TimeFrameUnit;

    use super::*;

    #[test]
    fn defaults_match_the_reference_setup() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.market.symbol, "GC=F");
        assert_eq!(config.history_lookback().unwrap(), Lookback::years(10));
        assert_eq!(config.history_timeframe().unwrap(), TimeFrame::day());
        assert_eq!(config.live_timeframe().unwrap().unit, TimeFrameUnit::Minute);
        assert_eq!(config.model.path, PathBuf::from("gold_model_live.bin"));
        assert_eq!(config.forest_params(), ForestParams::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let raw = r#"
            [market]
            symbol = "SI=F"

            [model]
            n_trees = 25
            max_depth = 12
        "#;
        let config = AppConfig::from_toml_str(raw, Path::new("test.toml")).unwrap();
        assert_eq!(config.market.symbol, "SI=F");
        assert_eq!(config.market.history_lookback, "10y");
        assert_eq!(config.model.n_trees, 25);
        assert_eq!(config.model.max_depth, Some(12));
        assert_eq!(config.model.seed, 42);
        assert_eq!(config.provider.max_retries, 1);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let raw = "[model]\ntrees = 10\n";
        let err = AppConfig::from_toml_str(raw, Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn env_overrides_win_over_file() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_SYMBOL, "HG=F"),
            (ENV_MODEL_PATH, "/tmp/copper.bin"),
            (ENV_PROVIDER_URL, "  "),
        ]);
        let mut config = AppConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.market.symbol, "HG=F");
        assert_eq!(config.model.path, PathBuf::from("/tmp/copper.bin"));
        assert_eq!(config.provider.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn bad_intervals_are_reported_by_field() {
        let mut config = AppConfig::default();
        config.market.history_lookback = "forever".into();
        match config.validate() {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "market.history_lookback"),
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = AppConfig::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
