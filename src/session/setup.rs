//! Vehicle setup run once at session open
//!
//! Setup is an ordered list of idempotent steps. Each step reads the current
//! setting and only writes it when it differs from the target, so a retried
//! or repeated step is harmless. The stepper advances only when a step
//! succeeds and stops once a step has used up its attempts.

use drone_shared::SessionError;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

use super::state::SessionState;
use crate::config::SessionConfig;
use crate::hardware::{FlightControl, HardwareResult, StickAxis};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    EnsureStickSensitivities,
    ReadReturnHomeAltitude,
    ReadLowBatteryThreshold,
    DisableBeginnerMode,
    EnsureMaxHorizontalSpeed,
    ReadMaxFlightAltitude,
}

impl SetupStep {
    pub const ORDER: [SetupStep; 6] = [
        SetupStep::EnsureStickSensitivities,
        SetupStep::ReadReturnHomeAltitude,
        SetupStep::ReadLowBatteryThreshold,
        SetupStep::DisableBeginnerMode,
        SetupStep::EnsureMaxHorizontalSpeed,
        SetupStep::ReadMaxFlightAltitude,
    ];
}

pub struct SetupStepper {
    flight_control: Arc<dyn FlightControl>,
    state: Arc<SessionState>,
    config: Arc<SessionConfig>,
}

impl SetupStepper {
    pub fn new(
        flight_control: Arc<dyn FlightControl>,
        state: Arc<SessionState>,
        config: Arc<SessionConfig>,
    ) -> Self {
        Self {
            flight_control,
            state,
            config,
        }
    }

    /// Run every step in order
    pub async fn run(&self) -> Result<(), SessionError> {
        let max_attempts = self.config.setup_step_max_attempts.max(1);

        for step in SetupStep::ORDER {
            let mut attempt = 0;
            loop {
                if self.state.is_closed() {
                    return Err(SessionError::SessionClosed);
                }
                attempt += 1;

                match self.run_step(step).await {
                    Ok(()) => break,
                    Err(e) if attempt < max_attempts => {
                        warn!(
                            "[SETUP] {:?} failed (attempt {}/{}): {}",
                            step, attempt, max_attempts, e
                        );
                        tokio::time::sleep(self.config.tick_interval).await;
                    }
                    Err(e) => {
                        error!("[SETUP] {:?} failed, stopping setup: {}", step, e);
                        return Err(e);
                    }
                }
            }
        }

        info!("[SETUP] Flight controller configured");
        Ok(())
    }

    pub async fn run_step(&self, step: SetupStep) -> Result<(), SessionError> {
        let fc = &self.flight_control;

        match step {
            SetupStep::EnsureStickSensitivities => {
                for &(axis, target) in &self.config.stick_sensitivities {
                    self.ensure_stick_sensitivity(axis, target).await?;
                }
            }
            SetupStep::ReadReturnHomeAltitude => {
                let altitude = fc.return_home_altitude().await?;
                self.state
                    .update_settings(|s| s.return_home_altitude = Some(altitude));
                info!("[SETUP] Return home altitude {:.1} m", altitude);
            }
            SetupStep::ReadLowBatteryThreshold => {
                let percent = fc.low_battery_warning_percent().await?;
                self.state
                    .update_settings(|s| s.low_battery_threshold = Some(f64::from(percent) / 100.0));
                info!("[SETUP] Low battery warning at {}%", percent);
            }
            SetupStep::DisableBeginnerMode => {
                match fc.beginner_mode_enabled().await {
                    Ok(false) => debug!("[SETUP] Beginner mode already disabled"),
                    Ok(true) => {
                        fc.set_beginner_mode_enabled(false).await?;
                        info!("[SETUP] Beginner mode disabled");
                    }
                    Err(e) => {
                        warn!("[SETUP] Reading beginner mode failed: {}", e);
                        fc.set_beginner_mode_enabled(false).await?;
                        info!("[SETUP] Beginner mode disabled");
                    }
                }
                self.state.update_settings(|s| s.beginner_mode_disabled = true);
            }
            SetupStep::EnsureMaxHorizontalSpeed => {
                let target = self.config.max_horizontal_speed;
                let current = fc.max_horizontal_speed().await;
                if !self.within_tolerance(current, target, "max horizontal speed") {
                    fc.set_max_horizontal_speed(target).await?;
                    info!("[SETUP] Max horizontal speed set to {} m/s", target);
                }
            }
            SetupStep::ReadMaxFlightAltitude => {
                let altitude = fc.max_flight_altitude().await?;
                self.state.update_settings(|s| s.max_altitude = Some(altitude));
                info!("[SETUP] Max flight altitude {:.1} m", altitude);
            }
        }
        Ok(())
    }

    async fn ensure_stick_sensitivity(&self, axis: StickAxis, target: f64) -> Result<(), SessionError> {
        let current = self.flight_control.stick_sensitivity(axis).await;
        if self.within_tolerance(current, target, "stick sensitivity") {
            return Ok(());
        }
        self.flight_control.set_stick_sensitivity(axis, target).await?;
        info!("[SETUP] {:?} stick sensitivity set to {}", axis, target);
        Ok(())
    }

    /// A failed read counts as out of tolerance so the value is written
    fn within_tolerance(&self, current: HardwareResult<f64>, target: f64, name: &str) -> bool {
        match current {
            Ok(value) if (value - target).abs() <= self.config.stick_sensitivity_tolerance => {
                debug!("[SETUP] {} already {}", name, target);
                true
            }
            Ok(_) => false,
            Err(e) => {
                warn!("[SETUP] Reading {} failed: {}", name, e);
                false
            }
        }
    }
}

/// Read serial number and firmware version, each with its own retries.
/// Attempt `n` is followed by an `n` second wait before the next one.
pub async fn fetch_details(
    flight_control: Arc<dyn FlightControl>,
    state: Arc<SessionState>,
    max_attempts: u32,
) {
    let fc = flight_control.clone();
    if let Some(serial_number) = with_backoff("serial number", max_attempts, || fc.serial_number()).await
    {
        info!("[SESSION] Serial number {}", serial_number);
        state.set_serial_number(serial_number);
    }

    let fc = flight_control;
    if let Some(firmware_version) =
        with_backoff("firmware version", max_attempts, || fc.firmware_version()).await
    {
        info!("[SESSION] Firmware version {}", firmware_version);
        state.set_firmware_version(firmware_version);
    }
}

async fn with_backoff<T, F, Fut>(name: &str, max_attempts: u32, mut request: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = HardwareResult<T>>,
{
    let max_attempts = max_attempts.max(1);
    for attempt in 1..=max_attempts {
        match request().await {
            Ok(value) => return Some(value),
            Err(e) if attempt < max_attempts => {
                warn!(
                    "[SESSION] Reading {} failed (attempt {}/{}): {}",
                    name, attempt, max_attempts, e
                );
                tokio::time::sleep(Duration::from_secs(u64::from(attempt))).await;
            }
            Err(e) => error!("[SESSION] Reading {} failed: {}", name, e),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{SimulatedVehicle, Vehicle};
    use drone_shared::{HardwareError, HardwareErrorCode};

    fn stepper(vehicle: &SimulatedVehicle) -> (SetupStepper, Arc<SessionState>) {
        let state = Arc::new(SessionState::new());
        let fc = vehicle.flight_control().unwrap();
        let stepper = SetupStepper::new(fc, state.clone(), Arc::new(SessionConfig::default()));
        (stepper, state)
    }

    fn busy() -> HardwareError {
        HardwareError::new(HardwareErrorCode::Busy, "busy")
    }

    #[tokio::test(start_paused = true)]
    async fn test_setup_applies_targets() {
        let vehicle = SimulatedVehicle::new();
        let (stepper, state) = stepper(&vehicle);

        stepper.run().await.unwrap();

        assert_eq!(vehicle.stick_sensitivity(StickAxis::Pitch), Some(0.5));
        assert_eq!(vehicle.stick_sensitivity(StickAxis::Brake), Some(1.0));
        assert_eq!(vehicle.stick_sensitivity(StickAxis::YawSchedule), Some(0.75));
        assert!(!vehicle.beginner_mode());
        assert_eq!(vehicle.max_horizontal_speed(), 15.0);

        let settings = state.settings();
        assert_eq!(settings.return_home_altitude, Some(30.0));
        assert_eq!(settings.low_battery_threshold, Some(0.25));
        assert_eq!(settings.max_altitude, Some(120.0));
        assert!(settings.beginner_mode_disabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settings_in_tolerance_are_not_rewritten() {
        let vehicle = SimulatedVehicle::new();
        let (stepper, _) = stepper(&vehicle);

        stepper.run().await.unwrap();
        let writes = vehicle.calls("set_stick_sensitivity");
        stepper.run_step(SetupStep::EnsureStickSensitivities).await.unwrap();
        stepper.run_step(SetupStep::EnsureMaxHorizontalSpeed).await.unwrap();

        assert_eq!(writes, 7);
        assert_eq!(vehicle.calls("set_stick_sensitivity"), 7);
        assert_eq!(vehicle.calls("set_max_horizontal_speed"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_step_is_retried() {
        let vehicle = SimulatedVehicle::new();
        vehicle.fail_next("return_home_altitude", busy(), 2);
        let (stepper, state) = stepper(&vehicle);

        stepper.run().await.unwrap();

        assert_eq!(vehicle.calls("return_home_altitude"), 3);
        assert_eq!(state.settings().return_home_altitude, Some(30.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stepper_stops_at_exhausted_step() {
        let vehicle = SimulatedVehicle::new();
        vehicle.fail_always("return_home_altitude", busy());
        let (stepper, state) = stepper(&vehicle);

        assert!(stepper.run().await.is_err());

        assert_eq!(vehicle.calls("return_home_altitude"), 3);
        assert_eq!(vehicle.calls("low_battery_warning_percent"), 0);
        assert_eq!(state.settings().low_battery_threshold, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_details_retry_with_backoff() {
        let vehicle = SimulatedVehicle::new();
        vehicle.fail_next("serial_number", busy(), 2);
        let state = Arc::new(SessionState::new());
        let started = tokio::time::Instant::now();

        fetch_details(vehicle.flight_control().unwrap(), state.clone(), 3).await;

        assert_eq!(vehicle.calls("serial_number"), 3);
        assert_eq!(state.serial_number().as_deref(), Some("SIM-0001"));
        assert_eq!(state.firmware_version().as_deref(), Some("1.0.0"));
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_details_give_up() {
        let vehicle = SimulatedVehicle::new();
        vehicle.fail_always("firmware_version", busy());
        let state = Arc::new(SessionState::new());

        fetch_details(vehicle.flight_control().unwrap(), state.clone(), 3).await;

        assert_eq!(vehicle.calls("firmware_version"), 3);
        assert!(state.serial_number().is_some());
        assert!(!state.details_known());
    }
}
