//! Drone Session Shared Types
//!
//! This crate provides the device-agnostic command model, telemetry values,
//! user-facing messages and the activation state machine shared by the
//! session runtime and the mission logic that drives it.

pub mod command;
pub mod error;
pub mod state_machine;
pub mod telemetry;

pub use command::*;
pub use error::{HardwareError, HardwareErrorCode, SessionError};
pub use telemetry::*;

/// Logical sub-device index (camera 0, gimbal 0, ...)
pub type Channel = u32;

/// Timing parameters for the session runtime
pub mod timing {
    /// Coordinator loop tick interval in milliseconds
    pub const TICK_INTERVAL_MS: u64 = 100;

    /// Age after which a polled telemetry field is refreshed
    pub const TELEMETRY_REFRESH_MS: u64 = 5000;

    /// Settle time after camera and gimbal mode changes
    pub const MODE_FINISH_DELAY_MS: u64 = 1500;

    /// Default attempts per command before its error is surfaced
    pub const COMMAND_MAX_ATTEMPTS: u32 = 3;

    /// Attempts to read serial number and firmware version at open
    pub const DETAILS_MAX_ATTEMPTS: u32 = 3;

    /// Attempts per setup step before the stepper gives up
    pub const SETUP_STEP_MAX_ATTEMPTS: u32 = 3;

    /// Wait after a capture starts before the camera reports busy
    pub const CAPTURE_START_SETTLE_MS: u64 = 500;

    /// Poll interval while waiting for capture to stop or a file to appear
    pub const CAPTURE_POLL_MS: u64 = 250;

    /// Polls while waiting for capture to stop or a file to appear
    pub const CAPTURE_POLL_MAX_ATTEMPTS: u32 = 20;

    /// Poll interval while waiting for the camera to become idle
    pub const NOT_BUSY_POLL_MS: u64 = 100;

    /// Polls while waiting for the camera to become idle
    pub const NOT_BUSY_MAX_ATTEMPTS: u32 = 10;
}

/// Severity of a user-facing message, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
    Danger,
}

/// A status or disengage message surfaced to the operator
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub title: String,
    pub details: Option<String>,
    pub level: MessageLevel,
}

impl Message {
    /// Create a message without details
    pub fn new(title: impl Into<String>, level: MessageLevel) -> Self {
        Self {
            title: title.into(),
            details: None,
            level,
        }
    }

    /// Attach details to the message
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.details {
            Some(details) => write!(f, "{}: {}", self.title, details),
            None => write!(f, "{}", self.title),
        }
    }
}

/// Order messages by severity, most severe first, keeping insertion order
/// among messages of equal severity
pub fn rank_messages(messages: &mut [Message]) {
    messages.sort_by(|a, b| b.level.cmp(&a.level));
}
