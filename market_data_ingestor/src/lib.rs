//! Vendor-agnostic market data ingestion.
//!
//! [`models`] holds the canonical bar types and request parameters, and
//! [`providers`] holds the [`DataProvider`](providers::DataProvider) trait with
//! its concrete vendor implementations.

pub mod models;
pub mod providers;
