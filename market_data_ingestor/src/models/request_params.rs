use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::timeframe::{TimeFrame, TimeFrameError, TimeFrameUnit, split_amount};

/// Universal parameters for requesting time-series bar data from any market data provider.
///
/// This struct is designed to be vendor-agnostic. It is intended as the standard
/// input for all [`DataProvider`](crate::providers::DataProvider) implementations.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BarsRequestParams {
    /// List of symbols to request (e.g., `["GC=F"]`, `["AAPL"]`).
    pub symbols: Vec<String>,

    /// The time interval for each bar (e.g., 1 minute, 1 day).
    ///
    /// **Validation of allowed values is performed by each data provider
    /// implementation, according to their own API rules.**
    pub timeframe: TimeFrame,

    /// Which stretch of history to return.
    pub span: RequestSpan,
}

/// The time range of a bars request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RequestSpan {
    /// Trailing window ending now, as the vendor counts it (e.g. "the last 10 years",
    /// or "the last trading session" for `1d`).
    Lookback(Lookback),

    /// Explicit range; `start` inclusive, `end` exclusive (UTC).
    Between {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LookbackUnit {
    Day,
    Month,
    Year,
}

/// A trailing window such as `10y`, `6mo` or `1d`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lookback {
    pub amount: u32,
    pub unit: LookbackUnit,
}

impl Lookback {
    pub fn days(amount: u32) -> Self {
        Self {
            amount,
            unit: LookbackUnit::Day,
        }
    }

    pub fn months(amount: u32) -> Self {
        Self {
            amount,
            unit: LookbackUnit::Month,
        }
    }

    pub fn years(amount: u32) -> Self {
        Self {
            amount,
            unit: LookbackUnit::Year,
        }
    }
}

impl fmt::Display for Lookback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self.unit {
            LookbackUnit::Day => "d",
            LookbackUnit::Month => "mo",
            LookbackUnit::Year => "y",
        };
        write!(f, "{}{}", self.amount, suffix)
    }
}

impl FromStr for Lookback {
    type Err = TimeFrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (amount, suffix) = split_amount(s)?;
        let unit = match suffix.to_lowercase().as_str() {
            "d" | "day" | "days" => LookbackUnit::Day,
            "mo" | "month" | "months" => LookbackUnit::Month,
            "y" | "yr" | "year" | "years" => LookbackUnit::Year,
            _ => {
                return Err(TimeFrameError::InvalidInput {
                    message: format!("Invalid lookback unit: {suffix}"),
                });
            }
        };
        if amount == 0 {
            return Err(TimeFrameError::InvalidAmount {
                unit: TimeFrameUnit::Day,
                message: "lookback must cover at least one unit".into(),
            });
        }
        Ok(Self { amount, unit })
    }
}
