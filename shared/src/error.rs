//! Session error taxonomy
//!
//! `HardwareError` is what the hardware collaborator reports for a failed
//! request. `SessionError` is what command callbacks, delegates and control
//! sessions see.

use thiserror::Error;

use crate::command::CommandCategory;
use crate::Channel;

/// Error code class reported by the hardware collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareErrorCode {
    /// The feature is not implemented by this vehicle or firmware
    NotSupported,
    Busy,
    Timeout,
    Rejected,
    Disconnected,
    Other(i32),
}

/// A failed hardware request
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} ({code:?})")]
pub struct HardwareError {
    pub code: HardwareErrorCode,
    pub message: String,
}

impl HardwareError {
    pub fn new(code: HardwareErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::new(HardwareErrorCode::NotSupported, message)
    }

    pub fn is_not_supported(&self) -> bool {
        self.code == HardwareErrorCode::NotSupported
    }
}

/// Errors surfaced by the session runtime
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("No {category} available on channel {channel:?}")]
    DeviceUnavailable {
        category: CommandCategory,
        channel: Option<Channel>,
    },

    #[error("Command not handled: {0}")]
    CommandTypeUnhandled(&'static str),

    #[error("Capability not supported: {0}")]
    CapabilityUnsupported(String),

    #[error("Timed out waiting for {0}")]
    BusyTimeout(String),

    #[error("Unable to arm motors: {0}")]
    ArmFailed(String),

    #[error("Unable to take off: {0}")]
    TakeoffFailed(String),

    #[error("Telemetry unavailable")]
    TelemetryUnavailable,

    #[error("Control engine not supported: {0}")]
    ControlEngineUnsupported(String),

    #[error("Session closed")]
    SessionClosed,

    #[error("Camera mode does not support capture")]
    InvalidCameraMode,

    #[error("Hardware error: {0}")]
    Hardware(HardwareError),
}

impl SessionError {
    /// Whether the hardware reported the capability as not implemented
    pub fn is_unsupported(&self) -> bool {
        match self {
            SessionError::CapabilityUnsupported(_) => true,
            SessionError::Hardware(e) => e.is_not_supported(),
            _ => false,
        }
    }
}

impl From<HardwareError> for SessionError {
    fn from(error: HardwareError) -> Self {
        if error.is_not_supported() {
            SessionError::CapabilityUnsupported(error.message)
        } else {
            SessionError::Hardware(error)
        }
    }
}
