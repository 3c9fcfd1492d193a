use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::Deserialize;

use crate::models::bar::Bar;

#[derive(Deserialize, Debug)]
pub struct ChartEnvelope {
    pub chart: ChartBody,
}

#[derive(Deserialize, Debug)]
pub struct ChartBody {
    #[serde(default)]
    pub result: Option<Vec<ChartResult>>,
    #[serde(default)]
    pub error: Option<ChartError>,
}

#[derive(Deserialize, Debug)]
pub struct ChartError {
    pub code: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Deserialize, Debug)]
pub struct ChartResult {
    pub meta: ChartMeta,
    #[serde(default)]
    pub timestamp: Vec<i64>,
    #[serde(default)]
    pub indicators: Indicators,
}

#[derive(Deserialize, Debug)]
pub struct ChartMeta {
    pub symbol: String,
    #[serde(rename = "gmtoffset", default)]
    pub gmt_offset: i32,
}

#[derive(Deserialize, Debug, Default)]
pub struct Indicators {
    #[serde(default)]
    pub quote: Vec<QuoteColumns>,
}

/// Column-oriented OHLCV arrays; `null` marks a missing observation.
#[derive(Deserialize, Debug, Default)]
pub struct QuoteColumns {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<f64>>,
}

/// Rows kept and dropped when pivoting the columns into bars.
#[derive(Debug)]
pub struct ConvertedBars {
    pub bars: Vec<Bar>,
    pub dropped: usize,
}

impl ChartResult {
    pub fn exchange_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.meta.gmt_offset).unwrap_or_else(|| Utc.fix())
    }

    /// Pivots the column arrays into bars, dropping any row with a missing
    /// or non-finite field, or a timestamp outside chrono's range.
    pub fn into_bars(self) -> ConvertedBars {
        let quote = self.indicators.quote.into_iter().next().unwrap_or_default();
        let cell = |column: &[Option<f64>], i: usize| {
            column
                .get(i)
                .copied()
                .flatten()
                .filter(|value| value.is_finite())
        };

        let mut bars = Vec::with_capacity(self.timestamp.len());
        let mut dropped = 0;
        for (i, &ts) in self.timestamp.iter().enumerate() {
            let row = (
                DateTime::<Utc>::from_timestamp(ts, 0),
                cell(&quote.open, i),
                cell(&quote.high, i),
                cell(&quote.low, i),
                cell(&quote.close, i),
                cell(&quote.volume, i),
            );
            match row {
                (Some(timestamp), Some(open), Some(high), Some(low), Some(close), Some(volume)) => {
                    bars.push(Bar {
                        timestamp,
                        open,
                        high,
                        low,
                        close,
                        volume,
                    })
                }
                _ => dropped += 1,
            }
        }
        ConvertedBars { bars, dropped }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAILY: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"currency": "USD", "symbol": "GC=F", "gmtoffset": -14400,
                         "exchangeTimezoneName": "America/New_York"},
                "timestamp": [1717128000, 1717387200, 1717473600],
                "indicators": {"quote": [{
                    "open":   [2345.5, 2330.0, null],
                    "high":   [2360.1, 2370.4, 2350.0],
                    "low":    [2320.0, 2325.9, 2310.0],
                    "close":  [2345.8, 2367.2, 2330.1],
                    "volume": [120345, 98765, 87654]
                }]}
            }],
            "error": null
        }
    }"#;

    #[test]
    fn parses_daily_chart_and_drops_incomplete_rows() {
        let envelope: ChartEnvelope = serde_json::from_str(DAILY).unwrap();
        let result = envelope.chart.result.unwrap().into_iter().next().unwrap();
        assert_eq!(result.meta.symbol, "GC=F");
        assert_eq!(result.exchange_offset().local_minus_utc(), -14400);

        let converted = result.into_bars();
        assert_eq!(converted.dropped, 1);
        assert_eq!(converted.bars.len(), 2);
        assert_eq!(converted.bars[0].close, 2345.8);
        assert_eq!(converted.bars[1].volume, 98765.0);
        assert_eq!(converted.bars[1].timestamp.timestamp(), 1717387200);
    }

    #[test]
    fn parses_empty_session() {
        let body = r#"{"chart": {"result": [{"meta": {"symbol": "GC=F", "gmtoffset": -14400},
                        "indicators": {"quote": [{}]}}], "error": null}}"#;
        let envelope: ChartEnvelope = serde_json::from_str(body).unwrap();
        let result = envelope.chart.result.unwrap().into_iter().next().unwrap();
        let converted = result.into_bars();
        assert!(converted.bars.is_empty());
        assert_eq!(converted.dropped, 0);
    }

    #[test]
    fn parses_vendor_error() {
        let body = r#"{"chart": {"result": null, "error": {"code": "Not Found",
                        "description": "No data found, symbol may be delisted"}}}"#;
        let envelope: ChartEnvelope = serde_json::from_str(body).unwrap();
        assert!(envelope.chart.result.is_none());
        let error = envelope.chart.error.unwrap();
        assert_eq!(error.code, "Not Found");
        assert!(error.description.contains("delisted"));
    }
}
