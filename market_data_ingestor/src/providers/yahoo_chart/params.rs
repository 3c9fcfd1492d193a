use snafu::ensure;

use crate::{
    models::{
        request_params::{BarsRequestParams, RequestSpan},
        timeframe::TimeFrame,
    },
    providers::{ProviderError, ValidationSnafu},
};

/// Bar intervals the chart endpoint accepts.
pub const SUPPORTED_INTERVALS: &[&str] = &[
    "1m", "2m", "5m", "15m", "30m", "60m", "90m", "1h", "1d", "5d", "1wk", "1mo", "3mo",
];

/// Checks the timeframe against the vendor's interval list and returns the
/// `interval` query value.
pub fn validate_timeframe(timeframe: &TimeFrame) -> Result<String, ProviderError> {
    let interval = timeframe.to_string();
    ensure!(
        SUPPORTED_INTERVALS.contains(&interval.as_str()),
        ValidationSnafu {
            message: format!(
                "interval {interval} is not supported (expected one of {})",
                SUPPORTED_INTERVALS.join(", ")
            ),
        }
    );
    Ok(interval)
}

pub fn validate_request(params: &BarsRequestParams) -> Result<(), ProviderError> {
    ensure!(
        !params.symbols.is_empty(),
        ValidationSnafu {
            message: "at least one symbol is required",
        }
    );
    ensure!(
        params.symbols.iter().all(|s| !s.trim().is_empty()),
        ValidationSnafu {
            message: "symbols must not be blank",
        }
    );
    if let RequestSpan::Between { start, end } = &params.span {
        ensure!(
            start < end,
            ValidationSnafu {
                message: format!("start {start} must be before end {end}"),
            }
        );
    }
    Ok(())
}

/// Builds the query string for one chart request.
pub fn construct_params(params: &BarsRequestParams, interval: &str) -> Vec<(String, String)> {
    let mut query = vec![
        ("interval".to_string(), interval.to_string()),
        ("includePrePost".to_string(), "false".to_string()),
    ];
    match &params.span {
        RequestSpan::Lookback(lookback) => {
            query.push(("range".to_string(), lookback.to_string()));
        }
        RequestSpan::Between { start, end } => {
            query.push(("period1".to_string(), start.timestamp().to_string()));
            query.push(("period2".to_string(), end.timestamp().to_string()));
        }
    }
    query
}
