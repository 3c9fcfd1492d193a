//! Turning a loaded model and a set of market inputs into a forecast.

use std::{fmt, path::Path, sync::Arc};

use chrono::{Local, NaiveDate};

use crate::{
    artifact::{ArtifactError, ModelArtifact, TrainingMetadata},
    errors::ForecastError,
    features::{FeatureVector, PriceBar},
};

/// Read-only handle to a loaded model.
///
/// Loaded once at process start and passed to every prediction. Clones
/// share the same artifact.
#[derive(Debug, Clone)]
pub struct ModelHandle {
    artifact: Arc<ModelArtifact>,
}

impl ModelHandle {
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        ModelArtifact::load(path).map(Self::from_artifact)
    }

    pub fn from_artifact(artifact: ModelArtifact) -> Self {
        Self {
            artifact: Arc::new(artifact),
        }
    }

    pub fn metadata(&self) -> &TrainingMetadata {
        &self.artifact.metadata
    }

    /// Predicted next close for one row. Pure: same input, same output.
    pub fn predict(&self, features: &FeatureVector) -> Result<f64, ForecastError> {
        Ok(self.artifact.forest.predict(&features.to_array())?)
    }
}

/// The values a user can edit before asking for a forecast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketInputs {
    pub last_price: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
    pub forecast_date: NaiveDate,
}

impl MarketInputs {
    /// Placeholder values shown before any sync or edit.
    pub fn with_defaults(today: NaiveDate) -> Self {
        Self {
            last_price: 2000.00,
            open: 1995.00,
            high: 2010.00,
            low: 1985.00,
            volume: 120_000.0,
            forecast_date: today,
        }
    }

    /// Calendar columns come from `forecast_date`.
    pub fn to_features(&self) -> FeatureVector {
        FeatureVector::from_bar(&PriceBar {
            date: self.forecast_date,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.last_price,
            volume: self.volume,
        })
    }
}

impl Default for MarketInputs {
    fn default() -> Self {
        Self::with_defaults(Local::now().date_naive())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentiment {
    Bullish,
    Bearish,
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sentiment::Bullish => write!(f, "BULLISH"),
            Sentiment::Bearish => write!(f, "BEARISH"),
        }
    }
}

/// Figures derived from a prediction relative to the last traded price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastMetrics {
    pub net_change: f64,
    /// `None` when the last price is exactly zero.
    pub percent_change: Option<f64>,
    pub sentiment: Sentiment,
}

impl ForecastMetrics {
    pub fn compute(prediction: f64, last_price: f64) -> Self {
        let net_change = prediction - last_price;
        let percent_change = if last_price == 0.0 {
            None
        } else {
            Some(net_change * 100.0 / last_price)
        };
        let sentiment = if net_change >= 0.0 {
            Sentiment::Bullish
        } else {
            Sentiment::Bearish
        };
        Self {
            net_change,
            percent_change,
            sentiment,
        }
    }

    /// One-sentence reading of the forecast.
    pub fn summary(&self) -> String {
        match self.sentiment {
            Sentiment::Bullish => format!(
                "Model suggests a positive breakout of {} above current resistance levels.",
                format_usd(self.net_change)
            ),
            Sentiment::Bearish => format!(
                "Model suggests a corrective pullback of {} toward support levels.",
                format_usd(self.net_change.abs())
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionReport {
    pub inputs: MarketInputs,
    pub prediction: f64,
    pub metrics: ForecastMetrics,
    pub summary: String,
}

pub fn predict(
    model: &ModelHandle,
    inputs: &MarketInputs,
) -> Result<PredictionReport, ForecastError> {
    let prediction = model.predict(&inputs.to_features())?;
    let metrics = ForecastMetrics::compute(prediction, inputs.last_price);
    Ok(PredictionReport {
        inputs: *inputs,
        prediction,
        summary: metrics.summary(),
        metrics,
    })
}

/// `$1,234.50`, `-$50.00`.
pub fn format_usd(value: f64) -> String {
    let cents = format!("{:.2}", value.abs());
    let (whole, frac) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));
    let sign = if value < 0.0 && cents != "0.00" { "-" } else { "" };
    format!("{sign}${}.{frac}", group_thousands(whole))
}

/// Whole units with separators, e.g. `120,000`.
pub fn format_volume(value: f64) -> String {
    let whole = format!("{:.0}", value.abs());
    let sign = if value < 0.0 && whole != "0" { "-" } else { "" };
    format!("{sign}{}", group_thousands(&whole))
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// `2.50%`, or `n/a` when the percentage is undefined.
pub fn format_percent(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.2}%"),
        None => "n/a".to_string(),
    }
}
