//! Push-event listener traits
//!
//! Each event category has its own listener so implementors register only
//! for what they consume. Callbacks arrive on arbitrary threads and must
//! not block.

use drone_shared::{
    BatteryState, CameraStorageState, CameraSystemState, Channel, ControllerState,
    ExposureParameters, GimbalState, MediaFile, RemoteControllerState,
};

pub trait ControllerStateListener: Send + Sync {
    fn on_controller_state(&self, state: ControllerState);
}

pub trait BatteryListener: Send + Sync {
    fn on_battery_state(&self, state: BatteryState);
}

pub trait CameraListener: Send + Sync {
    fn on_system_state(&self, channel: Channel, state: CameraSystemState);

    fn on_storage_state(&self, channel: Channel, state: CameraStorageState);

    fn on_exposure_parameters(&self, channel: Channel, parameters: ExposureParameters);

    fn on_new_media_file(&self, channel: Channel, file: MediaFile);
}

pub trait GimbalListener: Send + Sync {
    fn on_gimbal_state(&self, channel: Channel, state: GimbalState);
}

pub trait RemoteControllerListener: Send + Sync {
    fn on_remote_controller_state(&self, channel: Channel, state: RemoteControllerState);
}

pub trait ConnectionListener: Send + Sync {
    fn on_connection_lost(&self);
}
