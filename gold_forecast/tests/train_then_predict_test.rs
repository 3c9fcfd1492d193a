use async_trait::async_trait;
use chrono::{Days, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use gold_forecast::{
    artifact::{ArtifactError, ModelArtifact},
    forest::ForestParams,
    inference::{MarketInputs, ModelHandle, Sentiment},
    terminal::{LiveFeed, SyncNotice, run_prediction, sync_live_data},
    training::{Trainer, TrainerSettings},
};
use market_data_ingestor::{
    models::{
        bar::Bar,
        bar_series::BarSeries,
        request_params::{BarsRequestParams, Lookback},
        timeframe::TimeFrame,
    },
    providers::{DataProvider, ProviderError},
};
use tempfile::TempDir;

/// Serves a daily history for training and a short minute series for syncs.
#[derive(Clone)]
struct ReplayProvider {
    daily: BarSeries,
    minute: BarSeries,
}

#[async_trait]
impl DataProvider for ReplayProvider {
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError> {
        if params.timeframe == TimeFrame::day() {
            Ok(vec![self.daily.clone()])
        } else {
            Ok(vec![self.minute.clone()])
        }
    }
}

fn new_york() -> FixedOffset {
    FixedOffset::west_opt(5 * 3600).unwrap()
}

fn daily_history(days: u64) -> BarSeries {
    let start = NaiveDate::from_ymd_opt(2015, 1, 5).unwrap();
    let bars = (0..days)
        .map(|i| {
            let date = start + Days::new(i);
            let local_midnight = new_york()
                .from_local_datetime(&date.and_time(NaiveTime::MIN))
                .single()
                .unwrap();
            let close = 1200.0 + (i as f64) * 0.5 + ((i % 11) as f64) * 2.0;
            Bar {
                timestamp: local_midnight.with_timezone(&Utc),
                open: close - 1.5,
                high: close + 4.0,
                low: close - 5.0,
                close,
                volume: 150_000.0 + ((i * 13) % 500) as f64,
            }
        })
        .collect();
    BarSeries {
        symbol: "GC=F".into(),
        timeframe: TimeFrame::day(),
        exchange_offset: new_york(),
        bars,
    }
}

fn minute_bar(close: f64) -> BarSeries {
    BarSeries {
        symbol: "GC=F".into(),
        timeframe: TimeFrame::minutes(1),
        exchange_offset: new_york(),
        bars: vec![Bar {
            timestamp: Utc.with_ymd_and_hms(2015, 9, 1, 15, 30, 0).unwrap(),
            open: close - 0.5,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 900.0,
        }],
    }
}

fn settings(dir: &TempDir) -> TrainerSettings {
    TrainerSettings {
        symbol: "GC=F".into(),
        lookback: Lookback::years(10),
        timeframe: TimeFrame::day(),
        min_examples: 30,
        params: ForestParams {
            n_trees: 12,
            ..ForestParams::default()
        },
        model_path: dir.path().join("gold_model_live.bin"),
    }
}

#[tokio::test]
async fn trained_model_survives_a_restart() {
    let dir = TempDir::new().unwrap();
    let provider = ReplayProvider {
        daily: daily_history(240),
        minute: minute_bar(1290.0),
    };

    let report = Trainer::new(provider.clone(), settings(&dir))
        .run()
        .await
        .unwrap();
    assert_eq!(report.n_examples, 239);
    // Bars stamped at New York midnight keep their New York date.
    assert_eq!(report.first_date, NaiveDate::from_ymd_opt(2015, 1, 5).unwrap());

    // Two independent loads stand in for two terminal processes.
    let first = ModelHandle::load(&report.model_path).unwrap();
    let second = ModelHandle::load(&report.model_path).unwrap();

    let inputs = MarketInputs::with_defaults(NaiveDate::from_ymd_opt(2015, 6, 10).unwrap());
    let a = run_prediction(&first, &inputs).unwrap();
    let b = run_prediction(&second, &inputs).unwrap();
    assert_eq!(a.prediction, b.prediction);
    assert!(a.prediction > 1100.0 && a.prediction < 1500.0);
    assert_eq!(a.metrics.sentiment, Sentiment::Bearish);

    let synced = sync_live_data(&provider, &LiveFeed::default(), inputs).await;
    assert!(matches!(synced.notice, SyncNotice::Updated { .. }));
    assert_eq!(synced.inputs.last_price, 1290.0);
    assert_eq!(synced.inputs.forecast_date, inputs.forecast_date);
    let c = run_prediction(&first, &synced.inputs).unwrap();
    assert!(c.metrics.percent_change.is_some());
}

#[tokio::test]
async fn terminal_refuses_a_missing_model() {
    let dir = TempDir::new().unwrap();
    let err = ModelHandle::load(&dir.path().join("gold_model_live.bin")).unwrap_err();
    assert!(matches!(err, ArtifactError::NotFound { .. }));

    std::fs::write(dir.path().join("garbage.bin"), b"GOLDFCST").unwrap();
    assert!(ModelArtifact::load(&dir.path().join("garbage.bin")).is_err());
}
