//! Canonical in-memory representation of a time-series bar (OHLCV).
//!
//! This struct is used as the standard output for all [`DataProvider`](crate::providers::DataProvider)
//! implementations, regardless of asset class (stocks, futures, crypto, etc.).

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

/// A single time-series bar (OHLCV) for a given timestamp.
///
/// This struct is vendor-agnostic and is used throughout the data ingestion pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    /// The timestamp for the start of this bar (UTC).
    pub timestamp: DateTime<Utc>,

    /// Opening price.
    pub open: f64,

    /// Highest price during the bar interval.
    pub high: f64,

    /// Lowest price during the bar interval.
    pub low: f64,

    /// Closing price.
    pub close: f64,

    /// Volume traded during the bar interval.
    pub volume: f64,
}

impl Bar {
    /// The calendar date of this bar as seen from the exchange's clock.
    ///
    /// Daily futures bars are stamped at the exchange's local midnight, so
    /// taking the UTC date would shift every bar one day back for exchanges
    /// west of Greenwich.
    pub fn session_date(&self, exchange_offset: FixedOffset) -> NaiveDate {
        self.timestamp.with_timezone(&exchange_offset).date_naive()
    }
}
