//! Request traits for the vehicle and its sub-devices

use async_trait::async_trait;
use drone_shared::{
    CameraMode, Channel, ExposureMode, FocusMode, GimbalMode, HardwareError, PhotoMode,
};
use std::sync::Arc;

use super::events::{
    BatteryListener, CameraListener, ConnectionListener, ControllerStateListener, GimbalListener,
    RemoteControllerListener,
};

pub type HardwareResult<T> = Result<T, HardwareError>;

/// Stick channels with a configurable sensitivity curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StickAxis {
    Pitch,
    Roll,
    Yaw,
    Thrust,
    Attitude,
    Brake,
    YawSchedule,
}

/// Absolute gimbal rotation in degrees; absent axes are left unchanged
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GimbalRotation {
    pub pitch: Option<f64>,
    pub roll: Option<f64>,
    pub yaw: Option<f64>,
}

/// Flight controller requests
#[async_trait]
pub trait FlightControl: Send + Sync {
    async fn arm_motors(&self) -> HardwareResult<()>;

    async fn start_takeoff(&self) -> HardwareResult<()>;

    async fn start_return_home(&self) -> HardwareResult<()>;

    async fn cancel_return_home(&self) -> HardwareResult<()>;

    async fn start_landing(&self) -> HardwareResult<()>;

    async fn cancel_landing(&self) -> HardwareResult<()>;

    async fn start_compass_calibration(&self) -> HardwareResult<()>;

    async fn serial_number(&self) -> HardwareResult<String>;

    async fn firmware_version(&self) -> HardwareResult<String>;

    async fn stick_sensitivity(&self, axis: StickAxis) -> HardwareResult<f64>;

    async fn set_stick_sensitivity(&self, axis: StickAxis, value: f64) -> HardwareResult<()>;

    /// Return-home altitude in meters
    async fn return_home_altitude(&self) -> HardwareResult<f64>;

    /// Low battery warning threshold in percent
    async fn low_battery_warning_percent(&self) -> HardwareResult<u8>;

    async fn beginner_mode_enabled(&self) -> HardwareResult<bool>;

    async fn set_beginner_mode_enabled(&self, enabled: bool) -> HardwareResult<()>;

    /// Max horizontal speed in m/s
    async fn max_horizontal_speed(&self) -> HardwareResult<f64>;

    async fn set_max_horizontal_speed(&self, value: f64) -> HardwareResult<()>;

    /// Max flight altitude in meters
    async fn max_flight_altitude(&self) -> HardwareResult<f64>;

    /// Fire-and-forget zero velocity command
    fn send_reset_velocity(&self);
}

/// Camera requests for one channel
#[async_trait]
pub trait CameraControl: Send + Sync {
    async fn set_mode(&self, mode: CameraMode) -> HardwareResult<()>;

    async fn set_photo_mode(&self, mode: PhotoMode) -> HardwareResult<()>;

    async fn exposure_mode(&self) -> HardwareResult<ExposureMode>;

    async fn set_exposure_mode(&self, mode: ExposureMode) -> HardwareResult<()>;

    async fn focus_mode(&self) -> HardwareResult<FocusMode>;

    async fn set_exposure_compensation(&self, value: f32) -> HardwareResult<()>;

    async fn set_iso(&self, value: u32) -> HardwareResult<()>;

    async fn set_shutter_speed(&self, value: f64) -> HardwareResult<()>;

    async fn set_aperture(&self, value: f32) -> HardwareResult<()>;

    async fn auto_lock_gimbal(&self) -> HardwareResult<bool>;

    async fn set_auto_lock_gimbal(&self, enabled: bool) -> HardwareResult<()>;

    /// Interval photo period in seconds
    async fn photo_interval(&self) -> HardwareResult<u32>;

    async fn set_photo_interval(&self, seconds: u32) -> HardwareResult<()>;

    async fn start_shoot_photo(&self) -> HardwareResult<()>;

    async fn stop_shoot_photo(&self) -> HardwareResult<()>;

    async fn start_record_video(&self) -> HardwareResult<()>;

    async fn stop_record_video(&self) -> HardwareResult<()>;
}

/// Gimbal requests for one channel
#[async_trait]
pub trait GimbalControl: Send + Sync {
    async fn set_mode(&self, mode: GimbalMode) -> HardwareResult<()>;

    async fn rotate(&self, rotation: GimbalRotation) -> HardwareResult<()>;
}

/// A connected vehicle: sub-device lookup and event registration
pub trait Vehicle: Send + Sync {
    fn flight_control(&self) -> Option<Arc<dyn FlightControl>>;

    fn camera(&self, channel: Channel) -> Option<Arc<dyn CameraControl>>;

    fn camera_channels(&self) -> Vec<Channel>;

    fn gimbal(&self, channel: Channel) -> Option<Arc<dyn GimbalControl>>;

    fn has_remote_controller(&self, channel: Channel) -> bool;

    fn model(&self) -> Option<String> {
        None
    }

    fn add_controller_listener(&self, listener: Arc<dyn ControllerStateListener>);

    fn add_battery_listener(&self, listener: Arc<dyn BatteryListener>);

    fn add_camera_listener(&self, listener: Arc<dyn CameraListener>);

    fn add_gimbal_listener(&self, listener: Arc<dyn GimbalListener>);

    fn add_remote_controller_listener(&self, listener: Arc<dyn RemoteControllerListener>);

    fn add_connection_listener(&self, listener: Arc<dyn ConnectionListener>);
}
