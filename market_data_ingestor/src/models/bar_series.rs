//! A collection of time-series bars for a specific symbol and timeframe.

use chrono::FixedOffset;

use crate::models::{bar::Bar, timeframe::TimeFrame};

/// Represents a complete set of time-series data for a single symbol.
///
/// This struct groups a vector of [`Bar`]s with their corresponding symbol
/// and [`TimeFrame`], making the data set self-describing.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    /// The symbol this data represents (e.g., "GC=F", "AAPL").
    pub symbol: String,
    /// The time interval for each bar in the series.
    pub timeframe: TimeFrame,
    /// UTC offset of the exchange the symbol trades on.
    pub exchange_offset: FixedOffset,
    /// The collection of OHLCV bars, in the order the provider returned them.
    pub bars: Vec<Bar>,
}

impl BarSeries {
    /// The last bar of the series, if any.
    pub fn latest(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}
