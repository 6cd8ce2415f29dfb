//! Bus arrival estimation service.
//!
//! Vehicles report speed and schedule deviation; the [`predictor::EtaEstimator`]
//! keeps a smoothed speed and a short delay window per vehicle and turns a
//! remaining distance into minutes. [`api::router`] exposes it over HTTP next
//! to a small demo route catalog.

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod history;
pub mod predictor;
pub mod types;

pub use config::{ConfidenceModel, EstimatorConfig, ServerConfig};
pub use history::{HistoryTracker, VehicleHistory};
pub use predictor::EtaEstimator;
