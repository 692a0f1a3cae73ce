//! Telemetry value types
//!
//! Snapshots pushed by the vehicle or read on demand. These are already in
//! the abstract representation; vendor conversions happen in the hardware
//! collaborator.

use crate::{Channel, Message, MessageLevel};
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// Attitude in radians
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Orientation {
    pub pitch: f64,
    pub roll: f64,
    pub yaw: f64,
}

/// Flight controller mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlightMode {
    #[default]
    Disarmed,
    Landed,
    Attitude,
    Gps,
    Takeoff,
    Landing,
    ManualGoHome,
    LowBatteryGoHome,
    FailsafeGoHome,
    FailsafeHover,
    Waypoint,
    Other,
}

impl FlightMode {
    /// Transient modes the operator should be told about
    pub fn message(&self) -> Option<Message> {
        let title = match self {
            FlightMode::Takeoff => "Taking off",
            FlightMode::Landing => "Landing",
            FlightMode::ManualGoHome => "Returning home",
            FlightMode::LowBatteryGoHome => "Returning home: low battery",
            FlightMode::FailsafeGoHome => "Returning home: failsafe",
            FlightMode::FailsafeHover => "Hovering: failsafe",
            _ => return None,
        };
        Some(Message::new(title, MessageLevel::Warning))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerWarning {
    #[default]
    Normal,
    Low,
    VeryLow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoFlyStatus {
    #[default]
    Normal,
    ApproachingNoFlyZone,
    UnderLimitFlyZone,
    MaxHeightInLimitFlyZone,
    InNoFlyZone,
}

/// Flight controller state, pushed by the vehicle
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ControllerState {
    pub motors_running: bool,
    pub flying: bool,
    pub flight_mode: FlightMode,
    pub returning_home: bool,
    pub gps_weak: bool,
    pub position: Option<GeoCoordinate>,
    pub home_location: Option<GeoCoordinate>,
    /// Altitude above takeoff in meters
    pub altitude: f64,
    /// Velocity north, east, down in m/s
    pub velocity: [f64; 3],
    pub orientation: Orientation,
    pub satellite_count: Option<u32>,
    /// GPS signal level in [0, 1]
    pub gps_signal_level: Option<f64>,
    pub remaining_flight_time: Option<f64>,
    pub ultrasonic_height: Option<f64>,
    pub reached_max_height: bool,
    pub reached_max_range: bool,
    pub compass_error: bool,
    pub imu_preheating: bool,
    pub imu_overheated: bool,
    pub unknown_battery: bool,
    pub battery_overheated: bool,
    pub battery_voltage_diff: bool,
    pub battery_low_temperature: bool,
    pub power_warning: PowerWarning,
    pub no_fly_status: NoFlyStatus,
}

impl ControllerState {
    /// Current location, unavailable while the GPS signal is weak
    pub fn location(&self) -> Option<GeoCoordinate> {
        if self.gps_weak {
            None
        } else {
            self.position
        }
    }

    pub fn horizontal_speed(&self) -> f64 {
        (self.velocity[0].powi(2) + self.velocity[1].powi(2)).sqrt()
    }

    pub fn vertical_speed(&self) -> f64 {
        self.velocity[2]
    }

    /// Direction of travel in radians
    pub fn course(&self) -> f64 {
        self.velocity[1].atan2(self.velocity[0])
    }

    pub fn is_landing(&self) -> bool {
        self.flight_mode == FlightMode::Landing
    }

    /// Status messages in the order the flight controller reports them
    pub fn status_messages(&self) -> Vec<Message> {
        let mut messages = Vec::new();

        match self.power_warning {
            PowerWarning::Normal => {}
            PowerWarning::Low => messages.push(Message::new("Low battery", MessageLevel::Warning)),
            PowerWarning::VeryLow => {
                messages.push(Message::new("Very low battery", MessageLevel::Danger))
            }
        }

        let no_fly = match self.no_fly_status {
            NoFlyStatus::Normal => None,
            NoFlyStatus::ApproachingNoFlyZone => Some("Approaching a no-fly zone"),
            NoFlyStatus::UnderLimitFlyZone => Some("Inside an altitude limited zone"),
            NoFlyStatus::MaxHeightInLimitFlyZone => Some("Maximum altitude reached in limited zone"),
            NoFlyStatus::InNoFlyZone => Some("Inside a no-fly zone"),
        };
        if let Some(details) = no_fly {
            messages.push(Message::new("Flight restriction", MessageLevel::Warning).with_details(details));
        }

        let flags = [
            (self.compass_error, "Compass error"),
            (self.imu_preheating, "IMU preheating"),
            (self.imu_overheated, "IMU overheated"),
            (self.unknown_battery, "Unknown battery"),
            (self.battery_overheated, "Battery overheated"),
            (self.battery_voltage_diff, "Battery cell voltage difference"),
            (self.battery_low_temperature, "Battery temperature low"),
            (self.reached_max_range, "Maximum distance reached"),
            (self.reached_max_height, "Maximum altitude reached"),
        ];
        for (active, title) in flags {
            if active {
                messages.push(Message::new(title, MessageLevel::Warning));
            }
        }

        if let Some(message) = self.flight_mode.message() {
            messages.push(message);
        }

        if self.location().is_none() {
            messages.push(
                Message::new("Location unavailable", MessageLevel::Danger)
                    .with_details("Wait for a strong GPS signal before flight"),
            );
        }

        if self.home_location.is_none() {
            messages.push(Message::new("Home location not set", MessageLevel::Danger));
        }

        messages
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatteryState {
    pub remaining_percent: u8,
    pub voltage: f64,
    pub temperature: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraMode {
    Photo,
    Video,
    Playback,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhotoMode {
    Single,
    Interval,
    Burst,
    Aeb,
    #[default]
    Unknown,
}

/// Camera system state, pushed per channel
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CameraSystemState {
    pub mode: CameraMode,
    pub photo_mode: Option<PhotoMode>,
    pub recording: bool,
    pub shooting_single_photo: bool,
    pub shooting_raw_photo: bool,
    pub shooting_interval_photo: bool,
    pub shooting_burst_photo: bool,
    pub storing_photo: bool,
    pub upgrading: bool,
    pub current_video_time: Option<f64>,
}

impl CameraSystemState {
    pub fn is_busy(&self) -> bool {
        self.storing_photo
            || self.shooting_single_photo
            || self.shooting_raw_photo
            || self.shooting_interval_photo
            || self.shooting_burst_photo
            || self.upgrading
    }

    pub fn is_capturing(&self) -> bool {
        self.recording
            || self.shooting_single_photo
            || self.shooting_raw_photo
            || self.shooting_interval_photo
            || self.shooting_burst_photo
    }

    pub fn is_capturing_photo_interval(&self) -> bool {
        self.shooting_interval_photo
    }

    pub fn is_capturing_video(&self) -> bool {
        self.recording
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CameraStorageState {
    pub inserted: bool,
    pub formatting: bool,
    pub initializing: bool,
    pub remaining_space_mb: Option<u64>,
    pub available_capture_count: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExposureMode {
    Program,
    ShutterPriority,
    AperturePriority,
    Manual,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusMode {
    Manual,
    Auto,
    AutoContinuous,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExposureParameters {
    pub iso: u32,
    pub shutter_speed: f64,
    pub aperture: f32,
    pub exposure_compensation: f32,
}

/// Composite camera view assembled from the per-category caches
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CameraState {
    pub system: CameraSystemState,
    pub storage: Option<CameraStorageState>,
    pub exposure_mode: Option<ExposureMode>,
    pub exposure_parameters: Option<ExposureParameters>,
    pub focus_mode: Option<FocusMode>,
}

impl CameraState {
    /// Busy capturing, storing, or while storage is being prepared
    pub fn is_busy(&self) -> bool {
        self.system.is_busy()
            || self
                .storage
                .as_ref()
                .map(|s| s.formatting || s.initializing)
                .unwrap_or(false)
    }

    pub fn is_sd_card_inserted(&self) -> bool {
        self.storage.as_ref().map(|s| s.inserted).unwrap_or(false)
    }

    pub fn storage_remaining_bytes(&self) -> Option<u64> {
        self.storage
            .as_ref()
            .and_then(|s| s.remaining_space_mb)
            .map(|mb| mb * 1_048_576)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GimbalMode {
    Free,
    YawFollow,
    Fpv,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GimbalState {
    pub mode: GimbalMode,
    /// Gimbal attitude in radians
    pub orientation: Orientation,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StickState {
    pub x: f64,
    pub y: f64,
    pub pressed: bool,
}

/// Remote controller hardware state
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemoteControllerState {
    pub left_stick: StickState,
    pub right_stick: StickState,
    pub left_wheel: f64,
    pub pause_button_pressed: bool,
    pub return_home_button_pressed: bool,
    pub c1_button_pressed: bool,
    pub c2_button_pressed: bool,
}

/// Media file as announced by the camera
#[derive(Debug, Clone, PartialEq)]
pub struct MediaFile {
    pub name: String,
    pub size_bytes: u64,
}

/// A captured file with the vehicle pose at the time it was announced
#[derive(Debug, Clone, PartialEq)]
pub struct CameraFile {
    pub channel: Channel,
    pub name: String,
    pub size_bytes: u64,
    pub created: SystemTime,
    pub coordinate: Option<GeoCoordinate>,
    pub altitude: Option<f64>,
    pub orientation: Orientation,
}

/// Identity details read from the vehicle once per session
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleDetails {
    pub serial_number: String,
    pub firmware_version: String,
    pub model: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn located_state() -> ControllerState {
        ControllerState {
            position: Some(GeoCoordinate {
                latitude: 47.6,
                longitude: -122.3,
            }),
            home_location: Some(GeoCoordinate {
                latitude: 47.6,
                longitude: -122.3,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_weak_gps_hides_location() {
        let mut state = located_state();
        assert!(state.location().is_some());

        state.gps_weak = true;
        assert!(state.location().is_none());
    }

    #[test]
    fn test_healthy_state_has_no_messages() {
        assert!(located_state().status_messages().is_empty());
    }

    #[test]
    fn test_status_messages_report_conditions() {
        let state = ControllerState {
            power_warning: PowerWarning::VeryLow,
            reached_max_height: true,
            flight_mode: FlightMode::Takeoff,
            ..located_state()
        };

        let titles: Vec<String> = state.status_messages().into_iter().map(|m| m.title).collect();
        assert_eq!(
            titles,
            vec!["Very low battery", "Maximum altitude reached", "Taking off"]
        );
    }

    #[test]
    fn test_missing_location_is_danger() {
        let state = ControllerState::default();
        let messages = state.status_messages();
        assert!(messages
            .iter()
            .any(|m| m.title == "Location unavailable" && m.level == MessageLevel::Danger));
        assert!(messages.iter().any(|m| m.title == "Home location not set"));
    }

    #[test]
    fn test_camera_busy_includes_storage() {
        let mut state = CameraState::default();
        assert!(!state.is_busy());

        state.storage = Some(CameraStorageState {
            formatting: true,
            ..Default::default()
        });
        assert!(state.is_busy());
    }

    #[test]
    fn test_capturing_flags() {
        let system = CameraSystemState {
            shooting_interval_photo: true,
            ..Default::default()
        };
        assert!(system.is_capturing());
        assert!(system.is_capturing_photo_interval());
        assert!(!system.is_capturing_video());
        assert!(system.is_busy());
    }
}
