//! Request/response handlers behind the `gold-terminal` binary.
//!
//! Each action takes the current [`MarketInputs`] and hands back new ones
//! (plus anything to display). Nothing is kept between calls except what
//! the caller threads through.

use std::{
    fmt,
    io::{self, BufRead, Write},
    str::FromStr,
};

use chrono::{DateTime, NaiveDate, Utc};
use market_data_ingestor::{
    models::{
        bar::Bar,
        request_params::{BarsRequestParams, Lookback, RequestSpan},
        timeframe::TimeFrame,
    },
    providers::DataProvider,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    config::{AppConfig, ConfigError},
    errors::ForecastError,
    inference::{
        self, MarketInputs, ModelHandle, PredictionReport, format_percent, format_usd,
        format_volume,
    },
};

/// Where the live sync pulls its bar from.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveFeed {
    pub symbol: String,
    pub lookback: Lookback,
    pub timeframe: TimeFrame,
}

impl LiveFeed {
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            symbol: config.market.symbol.clone(),
            lookback: config.live_lookback()?,
            timeframe: config.live_timeframe()?,
        })
    }
}

impl Default for LiveFeed {
    /// Most recent session of COMEX gold in one-minute bars.
    fn default() -> Self {
        Self {
            symbol: "GC=F".to_string(),
            lookback: Lookback::days(1),
            timeframe: TimeFrame::minutes(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncNotice {
    Updated { symbol: String, at: DateTime<Utc> },
    NoData { symbol: String },
    Failed { message: String },
}

impl fmt::Display for SyncNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncNotice::Updated { symbol, at } => {
                write!(f, "sync complete: {symbol} bar at {}", at.format("%Y-%m-%d %H:%M UTC"))
            }
            SyncNotice::NoData { symbol } => {
                write!(f, "no live data for {symbol}; keeping current values")
            }
            SyncNotice::Failed { message } => {
                write!(f, "live sync failed ({message}); keeping current values")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub inputs: MarketInputs,
    pub notice: SyncNotice,
}

/// Refreshes the price fields from the latest bar of `feed`.
///
/// Never fails: an empty response or a provider error returns `inputs`
/// untouched along with a notice. The forecast date is left alone.
pub async fn sync_live_data<P>(provider: &P, feed: &LiveFeed, inputs: MarketInputs) -> SyncOutcome
where
    P: DataProvider + ?Sized,
{
    let params = BarsRequestParams {
        symbols: vec![feed.symbol.clone()],
        timeframe: feed.timeframe.clone(),
        span: RequestSpan::Lookback(feed.lookback),
    };
    debug!(symbol = %feed.symbol, interval = %feed.timeframe, "syncing live bar");

    let series = match provider.fetch_bars(params).await {
        Ok(series) => series,
        Err(e) => {
            warn!(error = %e, "live sync failed");
            return SyncOutcome {
                inputs,
                notice: SyncNotice::Failed {
                    message: e.to_string(),
                },
            };
        }
    };

    let latest = series
        .iter()
        .filter(|s| s.symbol == feed.symbol || series.len() == 1)
        .flat_map(|s| s.bars.iter())
        .rev()
        .find(|bar| is_usable(bar));

    match latest {
        Some(bar) => SyncOutcome {
            inputs: MarketInputs {
                last_price: bar.close,
                open: bar.open,
                high: bar.high,
                low: bar.low,
                volume: bar.volume,
                forecast_date: inputs.forecast_date,
            },
            notice: SyncNotice::Updated {
                symbol: feed.symbol.clone(),
                at: bar.timestamp,
            },
        },
        None => SyncOutcome {
            inputs,
            notice: SyncNotice::NoData {
                symbol: feed.symbol.clone(),
            },
        },
    }
}

fn is_usable(bar: &Bar) -> bool {
    [bar.open, bar.high, bar.low, bar.close, bar.volume]
        .iter()
        .all(|v| v.is_finite())
}

pub fn run_prediction(
    model: &ModelHandle,
    inputs: &MarketInputs,
) -> Result<PredictionReport, ForecastError> {
    inference::predict(model, inputs)
}

/// One editable input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Edit {
    LastPrice(f64),
    Open(f64),
    High(f64),
    Low(f64),
    Volume(f64),
    Date(NaiveDate),
}

impl Edit {
    pub fn apply(self, inputs: &mut MarketInputs) {
        match self {
            Edit::LastPrice(v) => inputs.last_price = v,
            Edit::Open(v) => inputs.open = v,
            Edit::High(v) => inputs.high = v,
            Edit::Low(v) => inputs.low = v,
            Edit::Volume(v) => inputs.volume = v,
            Edit::Date(d) => inputs.forecast_date = d,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Sync,
    Set(Edit),
    Show,
    Predict,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command `{0}`")]
    Unknown(String),

    #[error("usage: set <close|open|high|low|volume|date> <value>")]
    SetUsage,

    #[error("unknown field `{0}`")]
    UnknownField(String),

    #[error("`{value}` is not a valid number for {field}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("`{0}` is not a date, expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("`{0}` takes no arguments")]
    UnexpectedArguments(&'static str),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Err(CommandError::Empty);
        };
        let rest: Vec<&str> = words.collect();

        let bare = |cmd: Command, name: &'static str| {
            if rest.is_empty() {
                Ok(cmd)
            } else {
                Err(CommandError::UnexpectedArguments(name))
            }
        };

        match head.to_lowercase().as_str() {
            "sync" => bare(Command::Sync, "sync"),
            "show" => bare(Command::Show, "show"),
            "predict" | "run" => bare(Command::Predict, "predict"),
            "help" | "?" => bare(Command::Help, "help"),
            "quit" | "exit" | "q" => bare(Command::Quit, "quit"),
            "set" => match rest.as_slice() {
                [field, value] => parse_edit(field, value).map(Command::Set),
                _ => Err(CommandError::SetUsage),
            },
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

/// Reads a typed-in amount such as `$2,050.5`. NaN and infinities are refused.
pub fn parse_amount(raw: &str) -> Result<f64, String> {
    raw.replace(',', "")
        .trim_start_matches('$')
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("`{raw}` is not a finite number"))
}

fn parse_edit(field: &str, value: &str) -> Result<Edit, CommandError> {
    let number = |name: &'static str| -> Result<f64, CommandError> {
        parse_amount(value).map_err(|_| CommandError::InvalidNumber {
            field: name,
            value: value.to_string(),
        })
    };

    match field.to_lowercase().as_str() {
        "close" | "last" | "price" => number("close").map(Edit::LastPrice),
        "open" => number("open").map(Edit::Open),
        "high" => number("high").map(Edit::High),
        "low" => number("low").map(Edit::Low),
        "volume" | "vol" => number("volume").map(Edit::Volume),
        "date" => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Edit::Date)
            .map_err(|_| CommandError::InvalidDate(value.to_string())),
        other => Err(CommandError::UnknownField(other.to_string())),
    }
}

pub const HELP: &str = "\
commands:
  sync                   pull the latest live bar into the inputs
  set <field> <value>    edit close, open, high, low, volume or date (YYYY-MM-DD)
  show                   print the current inputs
  predict                run the model on the current inputs
  help                   this text
  quit                   leave the terminal";

pub fn render_inputs(inputs: &MarketInputs) -> String {
    format!(
        "Market pulse\n\
         \x20 Last traded price  {}\n\
         \x20 Opening tick       {}\n\
         \x20 Session high       {}\n\
         \x20 Session low        {}\n\
         \x20 24h volume         {}\n\
         \x20 Forecast window    {} ({})",
        format_usd(inputs.last_price),
        format_usd(inputs.open),
        format_usd(inputs.high),
        format_usd(inputs.low),
        format_volume(inputs.volume),
        inputs.forecast_date.format("%Y-%m-%d"),
        inputs.forecast_date.format("%A"),
    )
}

pub fn render_report(report: &PredictionReport) -> String {
    let metrics = &report.metrics;
    format!(
        "Prediction engine output\n\
         \x20 Predicted target   {}\n\
         \x20 Projected yield    {} ({})\n\
         \x20 Trade sentiment    {}\n\
         {}",
        format_usd(report.prediction),
        format_usd(metrics.net_change),
        format_percent(metrics.percent_change),
        metrics.sentiment,
        report.summary,
    )
}

/// Read-eval-print loop over `input`, writing to `output`.
///
/// Returns the inputs as they stood when the user quit or `input` ran dry.
/// Bad commands and failed actions are reported and the loop carries on.
pub async fn run_interactive<P, R, W>(
    model: &ModelHandle,
    provider: &P,
    feed: &LiveFeed,
    mut inputs: MarketInputs,
    input: R,
    output: &mut W,
) -> io::Result<MarketInputs>
where
    P: DataProvider + ?Sized,
    R: BufRead,
    W: Write,
{
    writeln!(output, "{}", render_inputs(&inputs))?;
    writeln!(output, "type `help` for commands")?;

    let mut lines = input.lines();
    loop {
        write!(output, "gold> ")?;
        output.flush()?;
        let Some(line) = lines.next().transpose()? else {
            writeln!(output)?;
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<Command>() {
            Ok(Command::Quit) => break,
            Ok(Command::Help) => writeln!(output, "{HELP}")?,
            Ok(Command::Show) => writeln!(output, "{}", render_inputs(&inputs))?,
            Ok(Command::Set(edit)) => {
                edit.apply(&mut inputs);
                writeln!(output, "{}", render_inputs(&inputs))?;
            }
            Ok(Command::Sync) => {
                let outcome = sync_live_data(provider, feed, inputs).await;
                inputs = outcome.inputs;
                writeln!(output, "{}", outcome.notice)?;
                writeln!(output, "{}", render_inputs(&inputs))?;
            }
            Ok(Command::Predict) => match run_prediction(model, &inputs) {
                Ok(report) => writeln!(output, "{}", render_report(&report))?,
                Err(e) => writeln!(output, "prediction failed: {e}")?,
            },
            Err(e) => writeln!(output, "error: {e} (type `help` for commands)")?,
        }
    }

    Ok(inputs)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use chrono::{FixedOffset, TimeZone};
    use market_data_ingestor::models::bar_series::BarSeries;

    use super::*;
    use crate::{
        artifact::ModelArtifact,
        features::{build_examples, test_support::synthetic_history},
        forest::ForestParams,
        training::{
            test_support::{FakeProvider, series_from},
            train_model,
        },
    };

    fn model() -> ModelHandle {
        let examples = build_examples(&synthetic_history(50));
        let params = ForestParams {
            n_trees: 4,
            ..ForestParams::default()
        };
        let (artifact, _): (ModelArtifact, f64) =
            train_model(&examples, "GC=F", &params, 10).unwrap();
        ModelHandle::from_artifact(artifact)
    }

    fn start() -> MarketInputs {
        MarketInputs::with_defaults(NaiveDate::from_ymd_opt(2024, 3, 6).unwrap())
    }

    fn minute_series(closes: &[f64]) -> BarSeries {
        BarSeries {
            symbol: "GC=F".into(),
            timeframe: TimeFrame::minutes(1),
            exchange_offset: FixedOffset::west_opt(4 * 3600).unwrap(),
            bars: closes
                .iter()
                .enumerate()
                .map(|(i, &close)| Bar {
                    timestamp: Utc.with_ymd_and_hms(2024, 3, 5, 19, i as u32, 0).unwrap(),
                    open: close - 1.0,
                    high: close + 2.0,
                    low: close - 3.0,
                    close,
                    volume: 10.0 + i as f64,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn sync_takes_the_last_bar() {
        let provider = FakeProvider::returning(vec![minute_series(&[2150.0, 2151.0, 2152.5])]);
        let outcome = sync_live_data(&provider, &LiveFeed::default(), start()).await;

        assert_eq!(outcome.inputs.last_price, 2152.5);
        assert_eq!(outcome.inputs.open, 2151.5);
        assert_eq!(outcome.inputs.high, 2154.5);
        assert_eq!(outcome.inputs.low, 2149.5);
        assert_eq!(outcome.inputs.volume, 12.0);
        assert_eq!(outcome.inputs.forecast_date, start().forecast_date);
        assert!(matches!(outcome.notice, SyncNotice::Updated { .. }));

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].timeframe, TimeFrame::minutes(1));
        assert_eq!(requests[0].span, RequestSpan::Lookback(Lookback::days(1)));
    }

    #[tokio::test]
    async fn empty_sync_keeps_previous_values() {
        let mut edited = start();
        edited.last_price = 1234.0;

        let provider = FakeProvider::returning(vec![series_from("GC=F", &[])]);
        let outcome = sync_live_data(&provider, &LiveFeed::default(), edited).await;
        assert_eq!(outcome.inputs, edited);
        assert_eq!(
            outcome.notice,
            SyncNotice::NoData {
                symbol: "GC=F".into()
            }
        );

        let outcome = sync_live_data(&FakeProvider::failing(), &LiveFeed::default(), edited).await;
        assert_eq!(outcome.inputs, edited);
        assert!(outcome.notice.to_string().contains("keeping current values"));
    }

    #[test]
    fn parses_commands() {
        assert_eq!("sync".parse::<Command>(), Ok(Command::Sync));
        assert_eq!("  PREDICT ".parse::<Command>(), Ok(Command::Predict));
        assert_eq!(
            "set close 2,050.25".parse::<Command>(),
            Ok(Command::Set(Edit::LastPrice(2050.25)))
        );
        assert_eq!(
            "set date 2024-03-06".parse::<Command>(),
            Ok(Command::Set(Edit::Date(
                NaiveDate::from_ymd_opt(2024, 3, 6).unwrap()
            )))
        );
        assert_eq!("".parse::<Command>(), Err(CommandError::Empty));
        assert_eq!("set close".parse::<Command>(), Err(CommandError::SetUsage));
        assert_eq!(
            "set close abc".parse::<Command>(),
            Err(CommandError::InvalidNumber {
                field: "close",
                value: "abc".into()
            })
        );
        assert_eq!(
            "set volume NaN".parse::<Command>(),
            Err(CommandError::InvalidNumber {
                field: "volume",
                value: "NaN".into()
            })
        );
        assert_eq!(
            "set date 06/03/2024".parse::<Command>(),
            Err(CommandError::InvalidDate("06/03/2024".into()))
        );
        assert_eq!(
            "set weekday 3".parse::<Command>(),
            Err(CommandError::UnknownField("weekday".into()))
        );
        assert_eq!(
            "quit now".parse::<Command>(),
            Err(CommandError::UnexpectedArguments("quit"))
        );
        assert_eq!(
            "buy".parse::<Command>(),
            Err(CommandError::Unknown("buy".into()))
        );
    }

    #[test]
    fn amounts_must_be_finite() {
        assert_eq!(parse_amount("$2,050.5"), Ok(2050.5));
        assert_eq!(parse_amount("-12"), Ok(-12.0));
        for raw in ["NaN", "inf", "-infinity", "1e400", ""] {
            assert!(parse_amount(raw).is_err(), "{raw} should be refused");
        }
    }

    #[test]
    fn renders_inputs_and_report() {
        let shown = render_inputs(&start());
        assert!(shown.contains("$2,000.00"));
        assert!(shown.contains("120,000"));
        assert!(shown.contains("2024-03-06 (Wednesday)"));

        let mut inputs = start();
        inputs.last_price = 0.0;
        let report = run_prediction(&model(), &inputs).unwrap();
        let rendered = render_report(&report);
        assert!(rendered.contains("Predicted target"));
        assert!(rendered.contains("(n/a)"));
        assert!(rendered.contains(&report.summary));
    }

    #[tokio::test]
    async fn interactive_session_survives_bad_input() {
        let script = "set close 2100\nbogus\nset open x\nsync\npredict\nquit\nset close 1\n";
        let provider = FakeProvider::failing();
        let mut out = Vec::new();

        let inputs = run_interactive(
            &model(),
            &provider,
            &LiveFeed::default(),
            start(),
            Cursor::new(script),
            &mut out,
        )
        .await
        .unwrap();

        let out = String::from_utf8(out).unwrap();
        assert_eq!(inputs.last_price, 2100.0);
        assert!(out.contains("unknown command `bogus`"));
        assert!(out.contains("not a valid number for open"));
        assert!(out.contains("live sync failed"));
        assert!(out.contains("Prediction engine output"));
    }

    #[tokio::test]
    async fn interactive_session_ends_at_eof() {
        let mut out = Vec::new();
        let inputs = run_interactive(
            &model(),
            &FakeProvider::returning(vec![]),
            &LiveFeed::default(),
            start(),
            Cursor::new("set date 2024-12-31\n"),
            &mut out,
        )
        .await
        .unwrap();
        assert_eq!(
            inputs.forecast_date,
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
        );
    }
}
