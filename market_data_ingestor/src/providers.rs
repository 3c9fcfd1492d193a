//! Provider abstraction for market data sources.
//!
//! This module defines the [`DataProvider`] trait, which serves as a unified interface
//! for fetching time-series bar data from any market data vendor.
//!
//! Each concrete provider implementation (such as the Yahoo Finance chart API)
//! implements [`DataProvider`] to handle vendor-specific API logic and validation.
//!
//! The trait is designed for async usage and supports dynamic dispatch (`dyn DataProvider`)
//! for runtime selection of providers.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use market_data_ingestor::models::{
//!     bar_series::BarSeries,
//!     request_params::BarsRequestParams,
//! };
//! use market_data_ingestor::providers::{DataProvider, ProviderError};
//!
//! struct MyProvider;
//!
//! #[async_trait]
//! impl DataProvider for MyProvider {
//!     async fn fetch_bars(
//!         &self,
//!         _params: BarsRequestParams,
//!     ) -> Result<Vec<BarSeries>, ProviderError> {
//!         Ok(vec![])
//!     }
//! }
//! ```

pub mod yahoo_chart;

use async_trait::async_trait;
use snafu::{Backtrace, Snafu};

use crate::models::{bar_series::BarSeries, request_params::BarsRequestParams};

/// Trait for fetching time-series bar data from a market data provider.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Fetches time-series bar data for the given request parameters.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<BarSeries>)` - One series per requested symbol. A symbol for which
    ///   the vendor has no data yields an empty series, not an error.
    /// * `Err(ProviderError)` - If the request fails.
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError>;
}

/// Errors that can occur during the creation of a provider instance
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// A configured header value contains invalid characters.
    #[snafu(display("Invalid header value for {name}: {source}"))]
    InvalidHeader {
        name: String,
        source: reqwest::header::InvalidHeaderValue,
        backtrace: Backtrace,
    },
}

/// Errors that can occur within a `DataProvider` implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// An error during an API request (e.g., network failure, timeout, undecodable body).
    #[snafu(display("API request failed: {source}"))]
    Reqwest {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The provider answered with a non-success HTTP status and no structured error.
    #[snafu(display("HTTP {status}: {body}"))]
    Http {
        status: u16,
        body: String,
        backtrace: Backtrace,
    },

    /// The provider's API returned a specific error message (e.g., unknown symbol).
    #[snafu(display("API error: {message}"))]
    Api {
        message: String,
        backtrace: Backtrace,
    },

    /// The request parameters were invalid for this specific provider.
    #[snafu(display("Invalid parameters for provider: {message}"))]
    Validation {
        message: String,
        backtrace: Backtrace,
    },
}

impl ProviderError {
    /// Whether retrying the same request might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Reqwest { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            ProviderError::Http { status, .. } => *status == 429 || *status >= 500,
            ProviderError::Api { .. } | ProviderError::Validation { .. } => false,
        }
    }
}
