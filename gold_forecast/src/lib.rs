//! Next-day close forecasting for gold futures.
//!
//! The crate is shared by two binaries that only meet through a model file
//! on disk: `gold-trainer` fetches daily history, labels each bar with the
//! following close and fits a bagged tree ensemble ([`training`]), while
//! `gold-terminal` loads that model once and answers prediction requests
//! ([`inference`], [`terminal`]). Both build model inputs through
//! [`features`], and the feature schema stored in every [`artifact`] keeps
//! them in agreement.

pub mod artifact;
pub mod config;
pub mod errors;
pub mod features;
pub mod forest;
pub mod inference;
pub mod logging;
pub mod terminal;
pub mod training;
