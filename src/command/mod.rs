//! Command execution infrastructure for the session
//!
//! This module handles:
//! - Validating and routing kernel commands to per-channel queues
//! - Serial execution with retries and settle delays
//! - Dispatching to per-category command handlers
//! - Reporting command lifecycle to delegates

mod executor;
pub mod handlers;
pub mod queue;
pub mod router;

pub use executor::CommandExecutor;
pub use queue::{Command, CommandConfig, CommandFuture, CommandQueue, CommandResult};
pub use router::MultiChannelCommandQueue;
