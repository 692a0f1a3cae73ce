//! Telemetry Store
//!
//! Holds the latest value of every telemetry category. Pushed categories
//! are written by the vehicle's listener callbacks; polled categories
//! (exposure mode, focus mode) are written by the coordinator's refreshes.

use drone_shared::{
    BatteryState, CameraFile, CameraState, CameraStorageState, CameraSystemState, Channel,
    ControllerState, ExposureMode, ExposureParameters, FocusMode, GimbalMode, GimbalState,
    MediaFile, Orientation, RemoteControllerState,
};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::time::Duration;
use tracing::info;

use super::cache::{ChannelCells, Timestamped, TimestampedCell};
use crate::hardware::{
    BatteryListener, CameraListener, ControllerStateListener, GimbalListener,
    RemoteControllerListener,
};
use crate::session::delegate::SessionNotifier;

pub struct TelemetryStore {
    controller: TimestampedCell<ControllerState>,
    battery: TimestampedCell<BatteryState>,
    camera_systems: ChannelCells<CameraSystemState>,
    camera_storage: ChannelCells<CameraStorageState>,
    exposure_parameters: ChannelCells<ExposureParameters>,
    exposure_modes: ChannelCells<ExposureMode>,
    focus_modes: ChannelCells<FocusMode>,
    gimbals: ChannelCells<GimbalState>,
    remote_controllers: ChannelCells<RemoteControllerState>,
    most_recent_file: TimestampedCell<CameraFile>,
    notifier: Arc<SessionNotifier>,
}

impl TelemetryStore {
    pub fn new(notifier: Arc<SessionNotifier>) -> Self {
        Self {
            controller: TimestampedCell::new(),
            battery: TimestampedCell::new(),
            camera_systems: ChannelCells::new(),
            camera_storage: ChannelCells::new(),
            exposure_parameters: ChannelCells::new(),
            exposure_modes: ChannelCells::new(),
            focus_modes: ChannelCells::new(),
            gimbals: ChannelCells::new(),
            remote_controllers: ChannelCells::new(),
            most_recent_file: TimestampedCell::new(),
            notifier,
        }
    }

    pub fn controller_state(&self) -> Option<Timestamped<ControllerState>> {
        self.controller.read()
    }

    pub fn battery_state(&self) -> Option<Timestamped<BatteryState>> {
        self.battery.read()
    }

    pub fn camera_system_state(&self, channel: Channel) -> Option<Timestamped<CameraSystemState>> {
        self.camera_systems.read(channel)
    }

    pub fn camera_storage_state(&self, channel: Channel) -> Option<Timestamped<CameraStorageState>> {
        self.camera_storage.read(channel)
    }

    pub fn exposure_parameters(&self, channel: Channel) -> Option<Timestamped<ExposureParameters>> {
        self.exposure_parameters.read(channel)
    }

    pub fn exposure_mode(&self, channel: Channel) -> Option<Timestamped<ExposureMode>> {
        self.exposure_modes.read(channel)
    }

    pub fn focus_mode(&self, channel: Channel) -> Option<Timestamped<FocusMode>> {
        self.focus_modes.read(channel)
    }

    pub fn gimbal_state(&self, channel: Channel) -> Option<Timestamped<GimbalState>> {
        self.gimbals.read(channel)
    }

    pub fn remote_controller_state(
        &self,
        channel: Channel,
    ) -> Option<Timestamped<RemoteControllerState>> {
        self.remote_controllers.read(channel)
    }

    pub fn most_recent_camera_file(&self) -> Option<Timestamped<CameraFile>> {
        self.most_recent_file.read()
    }

    /// Composite camera view, stamped with the system state's timestamp.
    /// `None` until the camera has reported its system state.
    pub fn camera_state(&self, channel: Channel) -> Option<Timestamped<CameraState>> {
        let system = self.camera_systems.read(channel)?;
        let storage = self.camera_storage.read(channel).map(|s| s.value);
        let exposure_mode = self.exposure_modes.read(channel).map(|s| s.value);
        let exposure_parameters = self.exposure_parameters.read(channel).map(|s| s.value);
        let focus_mode = self.focus_modes.read(channel).map(|s| s.value);

        Some(system.map(|system| CameraState {
            system,
            storage,
            exposure_mode,
            exposure_parameters,
            focus_mode,
        }))
    }

    pub fn write_exposure_mode(&self, channel: Channel, mode: ExposureMode) {
        self.exposure_modes.write(channel, mode);
    }

    /// Drop the cached exposure mode so the next tick refreshes it
    pub fn invalidate_exposure_mode(&self, channel: Channel) {
        self.exposure_modes.clear(channel);
    }

    pub fn claim_exposure_mode_refresh(&self, channel: Channel, threshold: Duration) -> bool {
        self.exposure_modes.claim_refresh(channel, threshold)
    }

    pub fn write_focus_mode(&self, channel: Channel, mode: FocusMode) {
        self.focus_modes.write(channel, mode);
    }

    pub fn claim_focus_mode_refresh(&self, channel: Channel, threshold: Duration) -> bool {
        self.focus_modes.claim_refresh(channel, threshold)
    }

    /// Vehicle attitude with the gimbal's pitch and roll, and its yaw when
    /// the gimbal is free
    fn camera_orientation(&self, channel: Channel) -> Orientation {
        let mut orientation = self
            .controller
            .read()
            .map(|s| s.value.orientation)
            .unwrap_or_default();

        match self.gimbals.read(channel) {
            Some(gimbal) => {
                orientation.pitch = gimbal.value.orientation.pitch;
                orientation.roll = gimbal.value.orientation.roll;
                if gimbal.value.mode == GimbalMode::Free {
                    orientation.yaw = gimbal.value.orientation.yaw;
                }
            }
            None => {
                orientation.pitch = 0.0;
                orientation.roll = 0.0;
            }
        }
        orientation
    }
}

impl ControllerStateListener for TelemetryStore {
    fn on_controller_state(&self, state: ControllerState) {
        self.controller.write(state);
    }
}

impl BatteryListener for TelemetryStore {
    fn on_battery_state(&self, state: BatteryState) {
        self.battery.write(state);
    }
}

impl CameraListener for TelemetryStore {
    fn on_system_state(&self, channel: Channel, state: CameraSystemState) {
        self.camera_systems.write(channel, state);
    }

    fn on_storage_state(&self, channel: Channel, state: CameraStorageState) {
        self.camera_storage.write(channel, state);
    }

    fn on_exposure_parameters(&self, channel: Channel, parameters: ExposureParameters) {
        self.exposure_parameters.write(channel, parameters);
    }

    fn on_new_media_file(&self, channel: Channel, file: MediaFile) {
        let controller = self.controller.read().map(|s| s.value);
        let file = CameraFile {
            channel,
            name: file.name,
            size_bytes: file.size_bytes,
            created: SystemTime::now(),
            coordinate: controller.as_ref().and_then(|s| s.location()),
            altitude: controller.as_ref().map(|s| s.altitude),
            orientation: self.camera_orientation(channel),
        };

        info!("[CAMERA] New file on channel {}: {}", channel, file.name);
        self.most_recent_file.write(file.clone());
        self.notifier.camera_file_generated(&file);
    }
}

impl GimbalListener for TelemetryStore {
    fn on_gimbal_state(&self, channel: Channel, state: GimbalState) {
        self.gimbals.write(channel, state);
    }
}

impl RemoteControllerListener for TelemetryStore {
    fn on_remote_controller_state(&self, channel: Channel, state: RemoteControllerState) {
        self.remote_controllers.write(channel, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::delegate::SessionDelegate;
    use drone_shared::GeoCoordinate;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct FileRecorder {
        files: Mutex<Vec<CameraFile>>,
    }

    impl SessionDelegate for FileRecorder {
        fn on_camera_file_generated(&self, _session_id: &str, file: &CameraFile) {
            self.files.lock().push(file.clone());
        }
    }

    fn store() -> (TelemetryStore, Arc<FileRecorder>) {
        let notifier = Arc::new(SessionNotifier::new("test"));
        let recorder = Arc::new(FileRecorder::default());
        notifier.add(recorder.clone());
        (TelemetryStore::new(notifier), recorder)
    }

    #[test]
    fn test_camera_state_requires_system_state() {
        let (store, _) = store();
        store.write_exposure_mode(0, ExposureMode::Manual);
        assert!(store.camera_state(0).is_none());

        store.on_system_state(
            0,
            CameraSystemState {
                recording: true,
                ..Default::default()
            },
        );
        let state = store.camera_state(0).unwrap().value;
        assert!(state.system.is_capturing_video());
        assert_eq!(state.exposure_mode, Some(ExposureMode::Manual));
        assert!(state.storage.is_none());
    }

    #[test]
    fn test_new_media_file_uses_vehicle_pose() {
        let (store, recorder) = store();
        store.on_controller_state(ControllerState {
            position: Some(GeoCoordinate {
                latitude: 1.0,
                longitude: 2.0,
            }),
            altitude: 42.0,
            orientation: Orientation {
                pitch: 0.1,
                roll: 0.2,
                yaw: 1.5,
            },
            ..Default::default()
        });
        store.on_gimbal_state(
            0,
            GimbalState {
                mode: GimbalMode::YawFollow,
                orientation: Orientation {
                    pitch: -0.5,
                    roll: 0.0,
                    yaw: 0.3,
                },
            },
        );

        store.on_new_media_file(
            0,
            MediaFile {
                name: "IMG_0001.JPG".into(),
                size_bytes: 10,
            },
        );

        let file = store.most_recent_camera_file().unwrap().value;
        assert_eq!(file.altitude, Some(42.0));
        assert_eq!(file.coordinate.unwrap().latitude, 1.0);
        assert_eq!(file.orientation.pitch, -0.5);
        assert_eq!(file.orientation.roll, 0.0);
        // Gimbal yaw only applies in free mode
        assert_eq!(file.orientation.yaw, 1.5);
        assert_eq!(recorder.files.lock().len(), 1);
    }

    #[test]
    fn test_media_file_without_gimbal_zeroes_pitch_and_roll() {
        let (store, _) = store();
        store.on_controller_state(ControllerState {
            orientation: Orientation {
                pitch: 0.1,
                roll: 0.2,
                yaw: 1.0,
            },
            ..Default::default()
        });
        store.on_new_media_file(
            1,
            MediaFile {
                name: "IMG_0002.JPG".into(),
                size_bytes: 10,
            },
        );

        let file = store.most_recent_camera_file().unwrap().value;
        assert_eq!(file.channel, 1);
        assert_eq!(file.orientation.pitch, 0.0);
        assert_eq!(file.orientation.roll, 0.0);
        assert_eq!(file.orientation.yaw, 1.0);
        assert!(file.coordinate.is_none());
    }
}
