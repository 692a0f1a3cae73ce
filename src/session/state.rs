//! Session-scoped state written by the coordinator, the setup stepper and
//! the details fetch

use drone_shared::GeoCoordinate;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

/// Flight controller settings read once during setup
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControllerSettings {
    /// Meters above takeoff
    pub return_home_altitude: Option<f64>,
    /// Fraction of a full battery, 0.0 to 1.0
    pub low_battery_threshold: Option<f64>,
    /// Meters above takeoff
    pub max_altitude: Option<f64>,
    pub beginner_mode_disabled: bool,
}

pub struct SessionState {
    opened: SystemTime,
    closed: AtomicBool,
    initialized: AtomicBool,
    located: AtomicBool,
    serial_number: RwLock<Option<String>>,
    firmware_version: RwLock<Option<String>>,
    last_ground_location: RwLock<Option<GeoCoordinate>>,
    settings: RwLock<ControllerSettings>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            opened: SystemTime::now(),
            closed: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
            located: AtomicBool::new(false),
            serial_number: RwLock::new(None),
            firmware_version: RwLock::new(None),
            last_ground_location: RwLock::new(None),
            settings: RwLock::new(ControllerSettings::default()),
        }
    }

    pub fn opened(&self) -> SystemTime {
        self.opened
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Returns true only for the call that closed the session
    pub fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Returns true only for the first call
    pub fn mark_initialized(&self) -> bool {
        !self.initialized.swap(true, Ordering::SeqCst)
    }

    pub fn is_located(&self) -> bool {
        self.located.load(Ordering::SeqCst)
    }

    /// Returns true only for the first call
    pub fn mark_located(&self) -> bool {
        !self.located.swap(true, Ordering::SeqCst)
    }

    pub fn serial_number(&self) -> Option<String> {
        self.serial_number.read().clone()
    }

    pub fn set_serial_number(&self, serial_number: String) {
        *self.serial_number.write() = Some(serial_number);
    }

    pub fn firmware_version(&self) -> Option<String> {
        self.firmware_version.read().clone()
    }

    pub fn set_firmware_version(&self, firmware_version: String) {
        *self.firmware_version.write() = Some(firmware_version);
    }

    /// Serial number and firmware version have both been read
    pub fn details_known(&self) -> bool {
        self.serial_number.read().is_some() && self.firmware_version.read().is_some()
    }

    pub fn last_ground_location(&self) -> Option<GeoCoordinate> {
        *self.last_ground_location.read()
    }

    pub fn set_last_ground_location(&self, location: GeoCoordinate) {
        *self.last_ground_location.write() = Some(location);
    }

    pub fn settings(&self) -> ControllerSettings {
        *self.settings.read()
    }

    pub fn update_settings(&self, update: impl FnOnce(&mut ControllerSettings)) {
        update(&mut self.settings.write());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_way_flags() {
        let state = SessionState::new();
        assert!(state.mark_located());
        assert!(!state.mark_located());
        assert!(state.is_located());

        assert!(state.close());
        assert!(!state.close());
        assert!(state.is_closed());
    }

    #[test]
    fn test_details_need_both_values() {
        let state = SessionState::new();
        state.set_serial_number("SN".into());
        assert!(!state.details_known());
        state.set_firmware_version("1.0".into());
        assert!(state.details_known());
    }
}
