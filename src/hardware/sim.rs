//! Simulated vehicle
//!
//! An in-process vehicle that answers every request, reacts to actions by
//! pushing the telemetry a real vehicle would (arming spins the motors,
//! takeoff makes it airborne, a photo produces a media file) and records
//! every call. Failures can be scripted per request name.

use async_trait::async_trait;
use drone_shared::{
    BatteryState, CameraMode, CameraStorageState, CameraSystemState, Channel, ControllerState,
    ExposureMode, ExposureParameters, FlightMode, FocusMode, GimbalMode, GimbalState,
    HardwareError, HardwareErrorCode, MediaFile, PhotoMode, RemoteControllerState,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::debug;

use super::events::{
    BatteryListener, CameraListener, ConnectionListener, ControllerStateListener, GimbalListener,
    RemoteControllerListener,
};
use super::traits::{
    CameraControl, FlightControl, GimbalControl, GimbalRotation, HardwareResult, StickAxis, Vehicle,
};

/// Devices present on a simulated vehicle
#[derive(Debug, Clone)]
pub struct SimDevices {
    pub flight_control: bool,
    pub cameras: Vec<Channel>,
    pub gimbals: Vec<Channel>,
    pub remote_controllers: Vec<Channel>,
}

impl Default for SimDevices {
    fn default() -> Self {
        Self {
            flight_control: true,
            cameras: vec![0],
            gimbals: vec![0],
            remote_controllers: vec![0],
        }
    }
}

#[derive(Debug, Clone)]
struct Failure {
    error: HardwareError,
    /// `None` fails forever
    remaining: Option<u32>,
}

#[derive(Debug, Clone)]
struct Settings {
    serial_number: String,
    firmware_version: String,
    stick_sensitivity: HashMap<StickAxis, f64>,
    return_home_altitude: f64,
    low_battery_warning_percent: u8,
    beginner_mode: bool,
    max_horizontal_speed: f64,
    max_flight_altitude: f64,
    exposure_mode: ExposureMode,
    focus_mode: FocusMode,
    auto_lock_gimbal: bool,
    photo_interval: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            serial_number: "SIM-0001".into(),
            firmware_version: "1.0.0".into(),
            stick_sensitivity: HashMap::new(),
            return_home_altitude: 30.0,
            low_battery_warning_percent: 25,
            beginner_mode: true,
            max_horizontal_speed: 10.0,
            max_flight_altitude: 120.0,
            exposure_mode: ExposureMode::Program,
            focus_mode: FocusMode::Auto,
            auto_lock_gimbal: false,
            photo_interval: 2,
        }
    }
}

#[derive(Default)]
struct Listeners {
    controller: Vec<Arc<dyn ControllerStateListener>>,
    battery: Vec<Arc<dyn BatteryListener>>,
    camera: Vec<Arc<dyn CameraListener>>,
    gimbal: Vec<Arc<dyn GimbalListener>>,
    remote_controller: Vec<Arc<dyn RemoteControllerListener>>,
    connection: Vec<Arc<dyn ConnectionListener>>,
}

struct SimInner {
    devices: SimDevices,
    latency: Mutex<Duration>,
    calls: Mutex<HashMap<&'static str, u32>>,
    failures: Mutex<HashMap<&'static str, Failure>>,
    settings: Mutex<Settings>,
    controller: Mutex<ControllerState>,
    camera_systems: Mutex<BTreeMap<Channel, CameraSystemState>>,
    exposure: Mutex<BTreeMap<Channel, ExposureParameters>>,
    gimbals: Mutex<BTreeMap<Channel, GimbalState>>,
    rotations: Mutex<Vec<GimbalRotation>>,
    media_count: Mutex<u32>,
    listeners: Mutex<Listeners>,
}

impl SimInner {
    /// Record a request, wait the configured latency and apply scripted failures
    async fn call(&self, name: &'static str) -> HardwareResult<()> {
        *self.calls.lock().entry(name).or_insert(0) += 1;
        debug!("[SIM] {}", name);

        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut failures = self.failures.lock();
        let Some(failure) = failures.get_mut(name) else {
            return Ok(());
        };
        let error = failure.error.clone();
        let exhausted = match failure.remaining.as_mut() {
            None => false,
            Some(n) => {
                *n = n.saturating_sub(1);
                *n == 0
            }
        };
        if exhausted {
            failures.remove(name);
        }
        Err(error)
    }

    fn update_controller(&self, update: impl FnOnce(&mut ControllerState)) {
        let state = {
            let mut controller = self.controller.lock();
            update(&mut controller);
            controller.clone()
        };
        let listeners = self.listeners.lock().controller.clone();
        for listener in listeners {
            listener.on_controller_state(state.clone());
        }
    }

    fn update_camera_system(&self, channel: Channel, update: impl FnOnce(&mut CameraSystemState)) {
        let state = {
            let mut systems = self.camera_systems.lock();
            let system = systems.entry(channel).or_default();
            update(system);
            system.clone()
        };
        let listeners = self.listeners.lock().camera.clone();
        for listener in listeners {
            listener.on_system_state(channel, state.clone());
        }
    }

    fn update_exposure(&self, channel: Channel, update: impl FnOnce(&mut ExposureParameters)) {
        let parameters = {
            let mut exposure = self.exposure.lock();
            let parameters = exposure.entry(channel).or_default();
            update(parameters);
            parameters.clone()
        };
        let listeners = self.listeners.lock().camera.clone();
        for listener in listeners {
            listener.on_exposure_parameters(channel, parameters.clone());
        }
    }

    fn update_gimbal(&self, channel: Channel, update: impl FnOnce(&mut GimbalState)) {
        let state = {
            let mut gimbals = self.gimbals.lock();
            let gimbal = gimbals.entry(channel).or_default();
            update(gimbal);
            gimbal.clone()
        };
        let listeners = self.listeners.lock().gimbal.clone();
        for listener in listeners {
            listener.on_gimbal_state(channel, state.clone());
        }
    }

    fn new_media_file(&self, channel: Channel, extension: &str) {
        let name = {
            let mut count = self.media_count.lock();
            *count += 1;
            format!("SIM_{:04}.{}", *count, extension)
        };
        let listeners = self.listeners.lock().camera.clone();
        for listener in listeners {
            listener.on_new_media_file(
                channel,
                MediaFile {
                    name: name.clone(),
                    size_bytes: 4_194_304,
                },
            );
        }
    }
}

/// Simulated vehicle handle; clones share the same vehicle
#[derive(Clone)]
pub struct SimulatedVehicle {
    inner: Arc<SimInner>,
}

impl Default for SimulatedVehicle {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedVehicle {
    /// Vehicle with a flight controller, camera 0, gimbal 0 and remote controller 0
    pub fn new() -> Self {
        Self::with_devices(SimDevices::default())
    }

    pub fn with_devices(devices: SimDevices) -> Self {
        Self {
            inner: Arc::new(SimInner {
                devices,
                latency: Mutex::new(Duration::ZERO),
                calls: Mutex::new(HashMap::new()),
                failures: Mutex::new(HashMap::new()),
                settings: Mutex::new(Settings::default()),
                controller: Mutex::new(ControllerState::default()),
                camera_systems: Mutex::new(BTreeMap::new()),
                exposure: Mutex::new(BTreeMap::new()),
                gimbals: Mutex::new(BTreeMap::new()),
                rotations: Mutex::new(Vec::new()),
                media_count: Mutex::new(0),
                listeners: Mutex::new(Listeners::default()),
            }),
        }
    }

    /// Delay every request by `latency`
    pub fn set_latency(&self, latency: Duration) {
        *self.inner.latency.lock() = latency;
    }

    /// Number of times the named request was issued
    pub fn calls(&self, name: &str) -> u32 {
        self.inner.calls.lock().get(name).copied().unwrap_or(0)
    }

    /// Fail the next `times` calls of the named request
    pub fn fail_next(&self, name: &'static str, error: HardwareError, times: u32) {
        self.inner.failures.lock().insert(
            name,
            Failure {
                error,
                remaining: Some(times),
            },
        );
    }

    /// Fail every call of the named request
    pub fn fail_always(&self, name: &'static str, error: HardwareError) {
        self.inner
            .failures
            .lock()
            .insert(name, Failure { error, remaining: None });
    }

    pub fn set_serial_number(&self, serial_number: impl Into<String>) {
        self.inner.settings.lock().serial_number = serial_number.into();
    }

    pub fn stick_sensitivity(&self, axis: StickAxis) -> Option<f64> {
        self.inner.settings.lock().stick_sensitivity.get(&axis).copied()
    }

    pub fn beginner_mode(&self) -> bool {
        self.inner.settings.lock().beginner_mode
    }

    pub fn max_horizontal_speed(&self) -> f64 {
        self.inner.settings.lock().max_horizontal_speed
    }

    /// Gimbal rotations received, oldest first
    pub fn rotations(&self) -> Vec<GimbalRotation> {
        self.inner.rotations.lock().clone()
    }

    /// Push a full controller state
    pub fn emit_controller_state(&self, state: ControllerState) {
        self.inner.update_controller(|current| *current = state);
    }

    /// Modify and push the controller state
    pub fn update_controller(&self, update: impl FnOnce(&mut ControllerState)) {
        self.inner.update_controller(update);
    }

    pub fn emit_battery_state(&self, state: BatteryState) {
        let listeners = self.inner.listeners.lock().battery.clone();
        for listener in listeners {
            listener.on_battery_state(state.clone());
        }
    }

    pub fn emit_camera_system_state(&self, channel: Channel, state: CameraSystemState) {
        self.inner.update_camera_system(channel, |current| *current = state);
    }

    pub fn emit_camera_storage_state(&self, channel: Channel, state: CameraStorageState) {
        let listeners = self.inner.listeners.lock().camera.clone();
        for listener in listeners {
            listener.on_storage_state(channel, state.clone());
        }
    }

    pub fn emit_exposure_parameters(&self, channel: Channel, parameters: ExposureParameters) {
        self.inner.update_exposure(channel, |current| *current = parameters);
    }

    pub fn emit_gimbal_state(&self, channel: Channel, state: GimbalState) {
        self.inner.update_gimbal(channel, |current| *current = state);
    }

    pub fn emit_remote_controller_state(&self, channel: Channel, state: RemoteControllerState) {
        let listeners = self.inner.listeners.lock().remote_controller.clone();
        for listener in listeners {
            listener.on_remote_controller_state(channel, state.clone());
        }
    }

    pub fn emit_media_file(&self, channel: Channel) {
        self.inner.new_media_file(channel, "JPG");
    }

    /// Report a broken connection to every connection listener
    pub fn drop_connection(&self) {
        let listeners = self.inner.listeners.lock().connection.clone();
        for listener in listeners {
            listener.on_connection_lost();
        }
    }
}

impl Vehicle for SimulatedVehicle {
    fn flight_control(&self) -> Option<Arc<dyn FlightControl>> {
        if !self.inner.devices.flight_control {
            return None;
        }
        Some(Arc::new(SimFlightControl {
            inner: self.inner.clone(),
        }))
    }

    fn camera(&self, channel: Channel) -> Option<Arc<dyn CameraControl>> {
        if !self.inner.devices.cameras.contains(&channel) {
            return None;
        }
        Some(Arc::new(SimCamera {
            inner: self.inner.clone(),
            channel,
        }))
    }

    fn camera_channels(&self) -> Vec<Channel> {
        self.inner.devices.cameras.clone()
    }

    fn gimbal(&self, channel: Channel) -> Option<Arc<dyn GimbalControl>> {
        if !self.inner.devices.gimbals.contains(&channel) {
            return None;
        }
        Some(Arc::new(SimGimbal {
            inner: self.inner.clone(),
            channel,
        }))
    }

    fn has_remote_controller(&self, channel: Channel) -> bool {
        self.inner.devices.remote_controllers.contains(&channel)
    }

    fn model(&self) -> Option<String> {
        Some("Simulator".into())
    }

    fn add_controller_listener(&self, listener: Arc<dyn ControllerStateListener>) {
        self.inner.listeners.lock().controller.push(listener);
    }

    fn add_battery_listener(&self, listener: Arc<dyn BatteryListener>) {
        self.inner.listeners.lock().battery.push(listener);
    }

    fn add_camera_listener(&self, listener: Arc<dyn CameraListener>) {
        self.inner.listeners.lock().camera.push(listener);
    }

    fn add_gimbal_listener(&self, listener: Arc<dyn GimbalListener>) {
        self.inner.listeners.lock().gimbal.push(listener);
    }

    fn add_remote_controller_listener(&self, listener: Arc<dyn RemoteControllerListener>) {
        self.inner.listeners.lock().remote_controller.push(listener);
    }

    fn add_connection_listener(&self, listener: Arc<dyn ConnectionListener>) {
        self.inner.listeners.lock().connection.push(listener);
    }
}

struct SimFlightControl {
    inner: Arc<SimInner>,
}

#[async_trait]
impl FlightControl for SimFlightControl {
    async fn arm_motors(&self) -> HardwareResult<()> {
        self.inner.call("arm_motors").await?;
        self.inner.update_controller(|s| s.motors_running = true);
        Ok(())
    }

    async fn start_takeoff(&self) -> HardwareResult<()> {
        self.inner.call("start_takeoff").await?;
        self.inner.update_controller(|s| {
            s.motors_running = true;
            s.flying = true;
            s.flight_mode = FlightMode::Gps;
        });
        Ok(())
    }

    async fn start_return_home(&self) -> HardwareResult<()> {
        self.inner.call("start_return_home").await?;
        self.inner.update_controller(|s| {
            s.returning_home = true;
            s.flight_mode = FlightMode::ManualGoHome;
        });
        Ok(())
    }

    async fn cancel_return_home(&self) -> HardwareResult<()> {
        self.inner.call("cancel_return_home").await?;
        self.inner.update_controller(|s| {
            s.returning_home = false;
            s.flight_mode = FlightMode::Gps;
        });
        Ok(())
    }

    async fn start_landing(&self) -> HardwareResult<()> {
        self.inner.call("start_landing").await?;
        self.inner.update_controller(|s| s.flight_mode = FlightMode::Landing);
        Ok(())
    }

    async fn cancel_landing(&self) -> HardwareResult<()> {
        self.inner.call("cancel_landing").await?;
        self.inner.update_controller(|s| s.flight_mode = FlightMode::Gps);
        Ok(())
    }

    async fn start_compass_calibration(&self) -> HardwareResult<()> {
        self.inner.call("start_compass_calibration").await
    }

    async fn serial_number(&self) -> HardwareResult<String> {
        self.inner.call("serial_number").await?;
        Ok(self.inner.settings.lock().serial_number.clone())
    }

    async fn firmware_version(&self) -> HardwareResult<String> {
        self.inner.call("firmware_version").await?;
        Ok(self.inner.settings.lock().firmware_version.clone())
    }

    async fn stick_sensitivity(&self, axis: StickAxis) -> HardwareResult<f64> {
        self.inner.call("stick_sensitivity").await?;
        self.inner
            .settings
            .lock()
            .stick_sensitivity
            .get(&axis)
            .copied()
            .ok_or_else(|| HardwareError::new(HardwareErrorCode::Other(-1), "sensitivity not set"))
    }

    async fn set_stick_sensitivity(&self, axis: StickAxis, value: f64) -> HardwareResult<()> {
        self.inner.call("set_stick_sensitivity").await?;
        self.inner.settings.lock().stick_sensitivity.insert(axis, value);
        Ok(())
    }

    async fn return_home_altitude(&self) -> HardwareResult<f64> {
        self.inner.call("return_home_altitude").await?;
        Ok(self.inner.settings.lock().return_home_altitude)
    }

    async fn low_battery_warning_percent(&self) -> HardwareResult<u8> {
        self.inner.call("low_battery_warning_percent").await?;
        Ok(self.inner.settings.lock().low_battery_warning_percent)
    }

    async fn beginner_mode_enabled(&self) -> HardwareResult<bool> {
        self.inner.call("beginner_mode_enabled").await?;
        Ok(self.inner.settings.lock().beginner_mode)
    }

    async fn set_beginner_mode_enabled(&self, enabled: bool) -> HardwareResult<()> {
        self.inner.call("set_beginner_mode_enabled").await?;
        self.inner.settings.lock().beginner_mode = enabled;
        Ok(())
    }

    async fn max_horizontal_speed(&self) -> HardwareResult<f64> {
        self.inner.call("max_horizontal_speed").await?;
        Ok(self.inner.settings.lock().max_horizontal_speed)
    }

    async fn set_max_horizontal_speed(&self, value: f64) -> HardwareResult<()> {
        self.inner.call("set_max_horizontal_speed").await?;
        self.inner.settings.lock().max_horizontal_speed = value;
        Ok(())
    }

    async fn max_flight_altitude(&self) -> HardwareResult<f64> {
        self.inner.call("max_flight_altitude").await?;
        Ok(self.inner.settings.lock().max_flight_altitude)
    }

    fn send_reset_velocity(&self) {
        *self.inner.calls.lock().entry("send_reset_velocity").or_insert(0) += 1;
        debug!("[SIM] send_reset_velocity");
    }
}

struct SimCamera {
    inner: Arc<SimInner>,
    channel: Channel,
}

#[async_trait]
impl CameraControl for SimCamera {
    async fn set_mode(&self, mode: CameraMode) -> HardwareResult<()> {
        self.inner.call("set_camera_mode").await?;
        self.inner.update_camera_system(self.channel, |s| s.mode = mode);
        Ok(())
    }

    async fn set_photo_mode(&self, mode: PhotoMode) -> HardwareResult<()> {
        self.inner.call("set_photo_mode").await?;
        self.inner
            .update_camera_system(self.channel, |s| s.photo_mode = Some(mode));
        Ok(())
    }

    async fn exposure_mode(&self) -> HardwareResult<ExposureMode> {
        self.inner.call("exposure_mode").await?;
        Ok(self.inner.settings.lock().exposure_mode)
    }

    async fn set_exposure_mode(&self, mode: ExposureMode) -> HardwareResult<()> {
        self.inner.call("set_exposure_mode").await?;
        self.inner.settings.lock().exposure_mode = mode;
        Ok(())
    }

    async fn focus_mode(&self) -> HardwareResult<FocusMode> {
        self.inner.call("focus_mode").await?;
        Ok(self.inner.settings.lock().focus_mode)
    }

    async fn set_exposure_compensation(&self, value: f32) -> HardwareResult<()> {
        self.inner.call("set_exposure_compensation").await?;
        self.inner
            .update_exposure(self.channel, |p| p.exposure_compensation = value);
        Ok(())
    }

    async fn set_iso(&self, value: u32) -> HardwareResult<()> {
        self.inner.call("set_iso").await?;
        self.inner.update_exposure(self.channel, |p| p.iso = value);
        Ok(())
    }

    async fn set_shutter_speed(&self, value: f64) -> HardwareResult<()> {
        self.inner.call("set_shutter_speed").await?;
        self.inner
            .update_exposure(self.channel, |p| p.shutter_speed = value);
        Ok(())
    }

    async fn set_aperture(&self, value: f32) -> HardwareResult<()> {
        self.inner.call("set_aperture").await?;
        self.inner.update_exposure(self.channel, |p| p.aperture = value);
        Ok(())
    }

    async fn auto_lock_gimbal(&self) -> HardwareResult<bool> {
        self.inner.call("auto_lock_gimbal").await?;
        Ok(self.inner.settings.lock().auto_lock_gimbal)
    }

    async fn set_auto_lock_gimbal(&self, enabled: bool) -> HardwareResult<()> {
        self.inner.call("set_auto_lock_gimbal").await?;
        self.inner.settings.lock().auto_lock_gimbal = enabled;
        Ok(())
    }

    async fn photo_interval(&self) -> HardwareResult<u32> {
        self.inner.call("photo_interval").await?;
        Ok(self.inner.settings.lock().photo_interval)
    }

    async fn set_photo_interval(&self, seconds: u32) -> HardwareResult<()> {
        self.inner.call("set_photo_interval").await?;
        self.inner.settings.lock().photo_interval = seconds;
        Ok(())
    }

    async fn start_shoot_photo(&self) -> HardwareResult<()> {
        self.inner.call("start_shoot_photo").await?;
        let interval = self
            .inner
            .camera_systems
            .lock()
            .get(&self.channel)
            .and_then(|s| s.photo_mode)
            == Some(PhotoMode::Interval);
        if interval {
            self.inner
                .update_camera_system(self.channel, |s| s.shooting_interval_photo = true);
        } else {
            self.inner.new_media_file(self.channel, "JPG");
        }
        Ok(())
    }

    async fn stop_shoot_photo(&self) -> HardwareResult<()> {
        self.inner.call("stop_shoot_photo").await?;
        self.inner
            .update_camera_system(self.channel, |s| s.shooting_interval_photo = false);
        Ok(())
    }

    async fn start_record_video(&self) -> HardwareResult<()> {
        self.inner.call("start_record_video").await?;
        self.inner
            .update_camera_system(self.channel, |s| s.recording = true);
        Ok(())
    }

    async fn stop_record_video(&self) -> HardwareResult<()> {
        self.inner.call("stop_record_video").await?;
        self.inner
            .update_camera_system(self.channel, |s| s.recording = false);
        self.inner.new_media_file(self.channel, "MP4");
        Ok(())
    }
}

struct SimGimbal {
    inner: Arc<SimInner>,
    channel: Channel,
}

#[async_trait]
impl GimbalControl for SimGimbal {
    async fn set_mode(&self, mode: GimbalMode) -> HardwareResult<()> {
        self.inner.call("set_gimbal_mode").await?;
        self.inner.update_gimbal(self.channel, |s| s.mode = mode);
        Ok(())
    }

    async fn rotate(&self, rotation: GimbalRotation) -> HardwareResult<()> {
        self.inner.call("rotate_gimbal").await?;
        self.inner.rotations.lock().push(rotation);
        self.inner.update_gimbal(self.channel, |s| {
            if let Some(pitch) = rotation.pitch {
                s.orientation.pitch = pitch.to_radians();
            }
            if let Some(roll) = rotation.roll {
                s.orientation.roll = roll.to_radians();
            }
            if let Some(yaw) = rotation.yaw {
                s.orientation.yaw = yaw.to_radians();
            }
        });
        Ok(())
    }
}
