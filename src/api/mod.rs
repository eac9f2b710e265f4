pub mod client;
pub mod session;
pub mod types;

pub use client::{ProsumerClient, TelemetryBackend};
pub use session::Session;
pub use types::{AdxRow, DeviceInfo, TokenPair};
