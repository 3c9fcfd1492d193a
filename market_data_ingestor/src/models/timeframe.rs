use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TimeFrameError {
    #[error("Invalid amount for {:?}: {}", unit, message)]
    InvalidAmount {
        unit: TimeFrameUnit,
        message: String,
    },

    #[error("Invalid input: {}", message)]
    InvalidInput { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeFrameUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

impl TimeFrameUnit {
    fn suffix(self) -> &'static str {
        match self {
            TimeFrameUnit::Minute => "m",
            TimeFrameUnit::Hour => "h",
            TimeFrameUnit::Day => "d",
            TimeFrameUnit::Week => "wk",
            TimeFrameUnit::Month => "mo",
        }
    }
}

/// A bar interval, `amount` × `unit` (e.g. 1 minute, 1 day).
///
/// No vendor rules are applied here; each provider validates the
/// combinations its API accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeFrame {
    pub amount: u32,
    pub unit: TimeFrameUnit,
}

impl TimeFrame {
    pub fn new(amount: u32, unit: TimeFrameUnit) -> Self {
        Self { amount, unit }
    }

    pub fn minutes(amount: u32) -> Self {
        Self::new(amount, TimeFrameUnit::Minute)
    }

    pub fn hours(amount: u32) -> Self {
        Self::new(amount, TimeFrameUnit::Hour)
    }

    pub fn day() -> Self {
        Self::new(1, TimeFrameUnit::Day)
    }

    pub fn week() -> Self {
        Self::new(1, TimeFrameUnit::Week)
    }

    pub fn months(amount: u32) -> Self {
        Self::new(amount, TimeFrameUnit::Month)
    }
}

/// Renders the compact vendor shorthand, e.g. `1m`, `1d`, `1wk`, `3mo`.
impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.suffix())
    }
}

impl FromStr for TimeFrame {
    type Err = TimeFrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (amount, suffix) = split_amount(s)?;
        let unit = match suffix.to_lowercase().as_str() {
            "m" | "min" | "minute" => TimeFrameUnit::Minute,
            "h" | "hr" | "hour" => TimeFrameUnit::Hour,
            "d" | "day" => TimeFrameUnit::Day,
            "w" | "wk" | "week" => TimeFrameUnit::Week,
            "mo" | "month" => TimeFrameUnit::Month,
            _ => {
                return Err(TimeFrameError::InvalidInput {
                    message: format!("Invalid timeframe unit: {suffix}"),
                });
            }
        };
        if amount == 0 {
            return Err(TimeFrameError::InvalidAmount {
                unit,
                message: "amount must be at least 1".into(),
            });
        }
        Ok(Self::new(amount, unit))
    }
}

/// Splits `"10y"` into `(10, "y")`. Shared by the timeframe and lookback parsers.
pub(crate) fn split_amount(s: &str) -> Result<(u32, &str), TimeFrameError> {
    let s = s.trim();
    let digits_end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    let (digits, suffix) = s.split_at(digits_end);
    if digits.is_empty() || suffix.is_empty() {
        return Err(TimeFrameError::InvalidInput {
            message: format!("expected <amount><unit>, got {s:?}"),
        });
    }
    let amount = digits.parse::<u32>().map_err(|e| TimeFrameError::InvalidInput {
        message: format!("invalid amount in {s:?}: {e}"),
    })?;
    Ok((amount, suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timeframe() {
        assert_eq!("1m".parse::<TimeFrame>().unwrap(), TimeFrame::minutes(1));
        assert_eq!("60m".parse::<TimeFrame>().unwrap(), TimeFrame::minutes(60));
        assert_eq!("2h".parse::<TimeFrame>().unwrap(), TimeFrame::hours(2));
        assert_eq!("1d".parse::<TimeFrame>().unwrap(), TimeFrame::day());
        assert_eq!("1wk".parse::<TimeFrame>().unwrap(), TimeFrame::week());
        assert_eq!("3mo".parse::<TimeFrame>().unwrap(), TimeFrame::months(3));
    }

    #[test]
    fn test_parse_timeframe_errors() {
        assert!(matches!(
            "0d".parse::<TimeFrame>(),
            Err(TimeFrameError::InvalidAmount {
                unit: TimeFrameUnit::Day,
                ..
            })
        ));
        assert!(matches!(
            "5x".parse::<TimeFrame>(),
            Err(TimeFrameError::InvalidInput { .. })
        ));
        assert!("d".parse::<TimeFrame>().is_err());
        assert!("15".parse::<TimeFrame>().is_err());
    }

    #[test]
    fn test_display_matches_vendor_shorthand() {
        assert_eq!(TimeFrame::minutes(1).to_string(), "1m");
        assert_eq!(TimeFrame::day().to_string(), "1d");
        assert_eq!(TimeFrame::week().to_string(), "1wk");
        assert_eq!(TimeFrame::months(3).to_string(), "3mo");
    }
}
