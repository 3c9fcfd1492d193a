//! Feature engineering shared by the trainer and the terminal.
//!
//! The regressor sees rows of nine numbers and nothing else, so both sides
//! must build those rows the same way. [`FeatureVector`] is the only way to
//! produce a row, and [`FeatureSchema`] records the column order in every
//! model artifact so a drift between the two processes fails at load time
//! instead of silently skewing predictions.

use chrono::{Datelike, NaiveDate};
use market_data_ingestor::models::bar_series::BarSeries;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::warn;

pub const FEATURE_COUNT: usize = 9;

/// Column order of every model input row.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "close",
    "volume",
    "open",
    "high",
    "low",
    "year",
    "month",
    "day",
    "day_of_week",
];

/// Bump whenever the meaning of a column changes without its name changing.
pub const SCHEMA_VERSION: u32 = 1;

/// One daily bar keyed by its exchange-local trading date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// Projects provider bars onto the exchange's calendar dates.
    pub fn from_series(series: &BarSeries) -> Vec<PriceBar> {
        series
            .bars
            .iter()
            .map(|bar| PriceBar {
                date: bar.session_date(series.exchange_offset),
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
            })
            .collect()
    }

    fn is_complete(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Ordered, versioned list of feature names stored alongside a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: u32,
    pub names: Vec<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error(
    "feature schema mismatch: model expects v{found_version} [{found}], this build produces v{expected_version} [{expected}]"
)]
pub struct SchemaMismatch {
    pub expected_version: u32,
    pub expected: String,
    pub found_version: u32,
    pub found: String,
}

impl FeatureSchema {
    /// The schema this build of the crate produces.
    pub fn current() -> Self {
        Self {
            version: SCHEMA_VERSION,
            names: FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
        }
    }

    /// Hex SHA-256 over the version and the ordered names.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.version.to_le_bytes());
        for name in &self.names {
            hasher.update((name.len() as u32).to_le_bytes());
            hasher.update(name.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Fails unless `self` (read from an artifact) matches `expected`.
    pub fn ensure_compatible(&self, expected: &FeatureSchema) -> Result<(), SchemaMismatch> {
        if self.fingerprint() == expected.fingerprint() {
            return Ok(());
        }
        Err(SchemaMismatch {
            expected_version: expected.version,
            expected: expected.names.join(","),
            found_version: self.version,
            found: self.names.join(","),
        })
    }
}

/// A model input row. Calendar columns are always derived from a real date,
/// never accepted as free values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    close: f64,
    volume: f64,
    open: f64,
    high: f64,
    low: f64,
    date: NaiveDate,
}

impl FeatureVector {
    pub fn from_bar(bar: &PriceBar) -> Self {
        Self {
            close: bar.close,
            volume: bar.volume,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            date: bar.date,
        }
    }

    pub fn close(&self) -> f64 {
        self.close
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }

    pub fn month(&self) -> u32 {
        self.date.month()
    }

    pub fn day(&self) -> u32 {
        self.date.day()
    }

    /// Monday = 0 … Sunday = 6.
    pub fn day_of_week(&self) -> u32 {
        self.date.weekday().num_days_from_monday()
    }

    /// The row in [`FEATURE_NAMES`] order.
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.close,
            self.volume,
            self.open,
            self.high,
            self.low,
            f64::from(self.year()),
            f64::from(self.month()),
            f64::from(self.day()),
            f64::from(self.day_of_week()),
        ]
    }
}

/// Features of one bar paired with the next bar's close.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledExample {
    /// Position of the bar in the normalized history.
    pub index: usize,
    pub date: NaiveDate,
    pub features: FeatureVector,
    pub label: f64,
}

/// What [`normalize_history`] had to change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryReport {
    pub input_bars: usize,
    pub incomplete_dropped: usize,
    pub reordered: bool,
    pub duplicates_removed: usize,
}

/// Cleans a raw history into a strictly ascending, one-bar-per-date series.
///
/// Bars with a missing (non-finite) field are dropped. Out-of-order input is
/// stable-sorted by date, and for a repeated date the bar that came last in
/// the input wins (vendors append corrections after the row they fix).
pub fn normalize_history(bars: Vec<PriceBar>) -> (Vec<PriceBar>, HistoryReport) {
    let mut report = HistoryReport {
        input_bars: bars.len(),
        ..HistoryReport::default()
    };

    let mut complete: Vec<PriceBar> = bars.into_iter().filter(PriceBar::is_complete).collect();
    report.incomplete_dropped = report.input_bars - complete.len();

    if !complete.windows(2).all(|w| w[0].date <= w[1].date) {
        complete.sort_by_key(|bar| bar.date);
        report.reordered = true;
    }

    let mut unique: Vec<PriceBar> = Vec::with_capacity(complete.len());
    for bar in complete {
        match unique.last_mut() {
            Some(last) if last.date == bar.date => {
                *last = bar;
                report.duplicates_removed += 1;
            }
            _ => unique.push(bar),
        }
    }

    if report.incomplete_dropped > 0 || report.reordered || report.duplicates_removed > 0 {
        warn!(
            input = report.input_bars,
            incomplete = report.incomplete_dropped,
            reordered = report.reordered,
            duplicates = report.duplicates_removed,
            "price history needed cleaning"
        );
    }

    (unique, report)
}

/// Pairs each bar with its successor's close. The last bar has no successor
/// and yields no example, so `n` bars give `n - 1` examples (zero for `n <= 1`).
///
/// Expects a history already passed through [`normalize_history`].
pub fn build_examples(bars: &[PriceBar]) -> Vec<LabeledExample> {
    bars.windows(2)
        .enumerate()
        .map(|(index, pair)| LabeledExample {
            index,
            date: pair[0].date,
            features: FeatureVector::from_bar(&pair[0]),
            label: pair[1].close,
        })
        .collect()
}

/// [`normalize_history`] followed by [`build_examples`].
pub fn prepare_examples(bars: Vec<PriceBar>) -> (Vec<LabeledExample>, HistoryReport) {
    let (clean, report) = normalize_history(bars);
    (build_examples(&clean), report)
}

/// Splits examples into model rows and targets.
pub fn design_matrix(examples: &[LabeledExample]) -> (Vec<Vec<f64>>, Vec<f64>) {
    examples
        .iter()
        .map(|e| (e.features.to_array().to_vec(), e.label))
        .unzip()
}
