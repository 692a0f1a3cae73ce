//! Kernel command model
//!
//! Commands are device-agnostic requests submitted by mission logic. Each one
//! belongs to a category and, for per-device categories, a channel. The
//! session runtime routes them to the queue for that category and channel.

use crate::telemetry::{CameraMode, ExposureMode, FocusMode, GimbalMode, PhotoMode};
use crate::Channel;

/// Session-assigned command identifier
pub type CommandId = u64;

/// Device category a command targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandCategory {
    Drone,
    RemoteController,
    Camera,
    Gimbal,
}

impl std::fmt::Display for CommandCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandCategory::Drone => write!(f, "drone"),
            CommandCategory::RemoteController => write!(f, "remote controller"),
            CommandCategory::Camera => write!(f, "camera"),
            CommandCategory::Gimbal => write!(f, "gimbal"),
        }
    }
}

/// Vehicle-wide actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DroneCommand {
    Takeoff,
    StartReturnHome,
    StopReturnHome,
    StartLanding,
    StopLanding,
    StartCompassCalibration,
    StopCompassCalibration,
}

/// Camera settings and capture actions
#[derive(Debug, Clone, PartialEq)]
pub enum CameraCommandKind {
    Mode(CameraMode),
    PhotoMode(PhotoMode),
    ExposureMode(ExposureMode),
    /// Exposure value offset in EV
    ExposureCompensation(f32),
    Iso(u32),
    /// Shutter speed in seconds
    ShutterSpeed(f64),
    /// Aperture f-number
    Aperture(f32),
    AutoLockGimbal(bool),
    /// Interval between photos in seconds
    PhotoInterval(u32),
    StartCapture {
        verify_file_created: bool,
    },
    StopCapture,
    FocusMode(FocusMode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CameraCommand {
    pub channel: Channel,
    pub kind: CameraCommandKind,
}

/// Target gimbal orientation in radians; absent axes are left unchanged
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GimbalOrientation {
    pub pitch: Option<f64>,
    pub roll: Option<f64>,
    pub yaw: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GimbalCommandKind {
    Mode(GimbalMode),
    Orientation(GimbalOrientation),
    YawSimultaneousFollow(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GimbalCommand {
    pub channel: Channel,
    pub kind: GimbalCommandKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteControllerCommandKind {
    TargetGimbalChannel(Channel),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteControllerCommand {
    pub channel: Channel,
    pub kind: RemoteControllerCommandKind,
}

/// A device-agnostic command
#[derive(Debug, Clone, PartialEq)]
pub enum KernelCommand {
    Drone(DroneCommand),
    RemoteController(RemoteControllerCommand),
    Camera(CameraCommand),
    Gimbal(GimbalCommand),
}

impl KernelCommand {
    pub fn category(&self) -> CommandCategory {
        match self {
            KernelCommand::Drone(_) => CommandCategory::Drone,
            KernelCommand::RemoteController(_) => CommandCategory::RemoteController,
            KernelCommand::Camera(_) => CommandCategory::Camera,
            KernelCommand::Gimbal(_) => CommandCategory::Gimbal,
        }
    }

    /// Channel for per-device categories; `None` for vehicle-wide commands
    pub fn channel(&self) -> Option<Channel> {
        match self {
            KernelCommand::Drone(_) => None,
            KernelCommand::RemoteController(c) => Some(c.channel),
            KernelCommand::Camera(c) => Some(c.channel),
            KernelCommand::Gimbal(c) => Some(c.channel),
        }
    }

    /// Whether this command changes a camera or gimbal mode
    pub fn is_mode_change(&self) -> bool {
        matches!(
            self,
            KernelCommand::Camera(CameraCommand {
                kind: CameraCommandKind::Mode(_),
                ..
            }) | KernelCommand::Gimbal(GimbalCommand {
                kind: GimbalCommandKind::Mode(_),
                ..
            })
        )
    }

    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            KernelCommand::Drone(c) => match c {
                DroneCommand::Takeoff => "takeoff",
                DroneCommand::StartReturnHome => "start return home",
                DroneCommand::StopReturnHome => "stop return home",
                DroneCommand::StartLanding => "start landing",
                DroneCommand::StopLanding => "stop landing",
                DroneCommand::StartCompassCalibration => "start compass calibration",
                DroneCommand::StopCompassCalibration => "stop compass calibration",
            },
            KernelCommand::RemoteController(c) => match c.kind {
                RemoteControllerCommandKind::TargetGimbalChannel(_) => "target gimbal channel",
            },
            KernelCommand::Camera(c) => match c.kind {
                CameraCommandKind::Mode(_) => "camera mode",
                CameraCommandKind::PhotoMode(_) => "photo mode",
                CameraCommandKind::ExposureMode(_) => "exposure mode",
                CameraCommandKind::ExposureCompensation(_) => "exposure compensation",
                CameraCommandKind::Iso(_) => "iso",
                CameraCommandKind::ShutterSpeed(_) => "shutter speed",
                CameraCommandKind::Aperture(_) => "aperture",
                CameraCommandKind::AutoLockGimbal(_) => "auto lock gimbal",
                CameraCommandKind::PhotoInterval(_) => "photo interval",
                CameraCommandKind::StartCapture { .. } => "start capture",
                CameraCommandKind::StopCapture => "stop capture",
                CameraCommandKind::FocusMode(_) => "focus mode",
            },
            KernelCommand::Gimbal(c) => match c.kind {
                GimbalCommandKind::Mode(_) => "gimbal mode",
                GimbalCommandKind::Orientation(_) => "gimbal orientation",
                GimbalCommandKind::YawSimultaneousFollow(_) => "gimbal yaw simultaneous follow",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_and_channel() {
        let command = KernelCommand::Camera(CameraCommand {
            channel: 1,
            kind: CameraCommandKind::StopCapture,
        });
        assert_eq!(command.category(), CommandCategory::Camera);
        assert_eq!(command.channel(), Some(1));

        let command = KernelCommand::Drone(DroneCommand::Takeoff);
        assert_eq!(command.category(), CommandCategory::Drone);
        assert_eq!(command.channel(), None);
    }

    #[test]
    fn test_mode_change_detection() {
        let camera_mode = KernelCommand::Camera(CameraCommand {
            channel: 0,
            kind: CameraCommandKind::Mode(CameraMode::Video),
        });
        let gimbal_mode = KernelCommand::Gimbal(GimbalCommand {
            channel: 0,
            kind: GimbalCommandKind::Mode(GimbalMode::Free),
        });
        let iso = KernelCommand::Camera(CameraCommand {
            channel: 0,
            kind: CameraCommandKind::Iso(100),
        });

        assert!(camera_mode.is_mode_change());
        assert!(gimbal_mode.is_mode_change());
        assert!(!iso.is_mode_change());
    }
}
