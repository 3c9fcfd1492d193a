//! Yahoo Finance chart API (`/v8/finance/chart/{symbol}`).
//!
//! No credentials are needed. Futures symbols use the vendor's `=F` suffix,
//! e.g. `GC=F` for COMEX gold.

pub mod params;
pub mod provider;
pub mod response;

pub use provider::{YahooChartConfig, YahooChartProvider};
