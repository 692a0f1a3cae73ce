//! Session configuration

use drone_shared::timing;
use tokio::time::Duration;

use crate::hardware::StickAxis;

/// Runtime configuration for a drone session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Initial session id, reassignable with `identify`
    pub session_id: String,
    pub tick_interval: Duration,
    /// Age after which exposure and focus mode are re-read
    pub telemetry_refresh: Duration,
    /// Settle time after camera and gimbal mode commands
    pub mode_finish_delay: Duration,
    pub command_max_attempts: u32,
    pub details_max_attempts: u32,
    pub setup_step_max_attempts: u32,
    pub capture_start_settle: Duration,
    pub capture_poll_interval: Duration,
    pub capture_poll_max_attempts: u32,
    pub not_busy_poll_interval: Duration,
    pub not_busy_max_attempts: u32,
    /// Target stick sensitivities applied during setup
    pub stick_sensitivities: Vec<(StickAxis, f64)>,
    pub stick_sensitivity_tolerance: f64,
    /// m/s
    pub max_horizontal_speed: f64,
    /// Degrees
    pub gimbal_reset_pitch: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: "session-001".into(),
            tick_interval: Duration::from_millis(timing::TICK_INTERVAL_MS),
            telemetry_refresh: Duration::from_millis(timing::TELEMETRY_REFRESH_MS),
            mode_finish_delay: Duration::from_millis(timing::MODE_FINISH_DELAY_MS),
            command_max_attempts: timing::COMMAND_MAX_ATTEMPTS,
            details_max_attempts: timing::DETAILS_MAX_ATTEMPTS,
            setup_step_max_attempts: timing::SETUP_STEP_MAX_ATTEMPTS,
            capture_start_settle: Duration::from_millis(timing::CAPTURE_START_SETTLE_MS),
            capture_poll_interval: Duration::from_millis(timing::CAPTURE_POLL_MS),
            capture_poll_max_attempts: timing::CAPTURE_POLL_MAX_ATTEMPTS,
            not_busy_poll_interval: Duration::from_millis(timing::NOT_BUSY_POLL_MS),
            not_busy_max_attempts: timing::NOT_BUSY_MAX_ATTEMPTS,
            stick_sensitivities: vec![
                (StickAxis::Pitch, 0.5),
                (StickAxis::Roll, 0.5),
                (StickAxis::Yaw, 0.5),
                (StickAxis::Thrust, 0.5),
                (StickAxis::Attitude, 1.0),
                (StickAxis::Brake, 1.0),
                (StickAxis::YawSchedule, 0.75),
            ],
            stick_sensitivity_tolerance: 0.01,
            max_horizontal_speed: 15.0,
            gimbal_reset_pitch: -12.0,
        }
    }
}
