use std::time::Duration;

use async_trait::async_trait;
use chrono::{Offset, Utc};
use reqwest::{Client, header};
use snafu::ResultExt;
use tracing::{debug, info, warn};

use crate::{
    models::{bar_series::BarSeries, request_params::BarsRequestParams},
    providers::{
        ApiSnafu, ClientBuildSnafu, DataProvider, HttpSnafu, InvalidHeaderSnafu, ProviderError,
        ProviderInitError, ReqwestSnafu,
        yahoo_chart::{
            params::{construct_params, validate_request, validate_timeframe},
            response::ChartEnvelope,
        },
    },
};

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

// The endpoint answers 429 to clients without a browser-like agent.
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) market_data_ingestor";

/// Connection settings for [`YahooChartProvider`].
#[derive(Clone, Debug)]
pub struct YahooChartConfig {
    pub base_url: String,
    /// Per-request timeout, covering connect and body.
    pub timeout: Duration,
    /// Extra attempts after a transient failure.
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub user_agent: String,
}

impl Default for YahooChartConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 1,
            retry_delay: Duration::from_millis(500),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

pub struct YahooChartProvider {
    client: Client,
    config: YahooChartConfig,
}

impl YahooChartProvider {
    /// Creates a provider with the default endpoint and a 10 second timeout.
    pub fn new() -> Result<Self, ProviderInitError> {
        Self::with_config(YahooChartConfig::default())
    }

    pub fn with_config(config: YahooChartConfig) -> Result<Self, ProviderInitError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_str(&config.user_agent).context(InvalidHeaderSnafu {
                name: "user-agent",
            })?,
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self { client, config })
    }

    fn chart_url(&self, symbol: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            symbol.trim()
        )
    }

    /// Sends one request, retrying transient failures up to `max_retries` times.
    async fn get_chart(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<ChartEnvelope, ProviderError> {
        let mut attempt = 0;
        loop {
            match self.try_get_chart(url, query).await {
                Ok(envelope) => return Ok(envelope),
                Err(err) if attempt < self.config.max_retries && err.is_transient() => {
                    attempt += 1;
                    warn!(
                        url,
                        attempt,
                        max_retries = self.config.max_retries,
                        error = %err,
                        "transient chart request failure, retrying"
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn try_get_chart(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<ChartEnvelope, ProviderError> {
        debug!(url, ?query, "requesting chart");
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .context(ReqwestSnafu)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown API error".to_string());
            // Client errors usually still carry the vendor's error object.
            if status.is_client_error() && status.as_u16() != 429 {
                if let Ok(envelope) = serde_json::from_str::<ChartEnvelope>(&body) {
                    if let Some(error) = envelope.chart.error {
                        return ApiSnafu {
                            message: format!("{}: {}", error.code, error.description),
                        }
                        .fail();
                    }
                }
            }
            return HttpSnafu {
                status: status.as_u16(),
                body,
            }
            .fail();
        }

        response.json::<ChartEnvelope>().await.context(ReqwestSnafu)
    }
}

#[async_trait]
impl DataProvider for YahooChartProvider {
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError> {
        // Validate before any network traffic.
        let interval = validate_timeframe(&params.timeframe)?;
        validate_request(&params)?;
        let query = construct_params(&params, &interval);

        let mut result = Vec::with_capacity(params.symbols.len());
        for symbol in &params.symbols {
            let envelope = self.get_chart(&self.chart_url(symbol), &query).await?;

            if let Some(error) = envelope.chart.error {
                return ApiSnafu {
                    message: format!("{}: {}", error.code, error.description),
                }
                .fail();
            }

            let Some(chart) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
                info!(symbol = %symbol, "provider returned no chart data");
                result.push(BarSeries {
                    symbol: symbol.clone(),
                    timeframe: params.timeframe.clone(),
                    exchange_offset: Utc.fix(),
                    bars: Vec::new(),
                });
                continue;
            };

            let exchange_offset = chart.exchange_offset();
            let converted = chart.into_bars();
            if converted.dropped > 0 {
                warn!(
                    symbol = %symbol,
                    dropped = converted.dropped,
                    "dropped rows with missing values"
                );
            }
            info!(symbol = %symbol, bars = converted.bars.len(), %interval, "fetched bars");

            result.push(BarSeries {
                symbol: symbol.clone(),
                timeframe: params.timeframe.clone(),
                exchange_offset,
                bars: converted.bars,
            });
        }

        Ok(result)
    }
}
