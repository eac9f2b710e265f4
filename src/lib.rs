//! Client library for the Prosumer telemetry backend: KQL query
//! construction, the authenticated HTTP client, time-series shaping and
//! the dashboard pipeline the CLI renders.

pub mod api;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod export;
pub mod kql;
pub mod logging;
pub mod series;

pub use api::{ProsumerClient, Session, TelemetryBackend};
pub use catalog::{InverterMode, Metric};
pub use dashboard::Dashboard;
pub use error::{Error, Result};
