//! Drone Session
//!
//! Session core for a remotely controlled vehicle: per-channel command
//! queues, timestamped telemetry caches, the coordinator loop that drives
//! them, and the activation flow that hands the vehicle over to direct
//! velocity control.

pub mod command;
pub mod config;
pub mod control;
pub mod hardware;
pub mod session;
pub mod telemetry;

pub use command::{CommandConfig, CommandExecutor};
pub use config::SessionConfig;
pub use control::{ExecutionEngine, VirtualStickSession};
pub use session::{DroneSession, SessionDelegate};
