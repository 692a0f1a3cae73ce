//! Telemetry caching

pub mod cache;
pub mod store;

pub use cache::{ChannelCells, Timestamped, TimestampedCell};
pub use store::TelemetryStore;
