//! Hardware capability interfaces
//!
//! The vehicle SDK is modeled as a set of async request traits, one per
//! device category, plus one push-listener trait per event category.

pub mod events;
pub mod sim;
pub mod traits;

pub use events::{
    BatteryListener, CameraListener, ConnectionListener, ControllerStateListener, GimbalListener,
    RemoteControllerListener,
};
pub use sim::{SimDevices, SimulatedVehicle};
pub use traits::{
    CameraControl, FlightControl, GimbalControl, GimbalRotation, HardwareResult, StickAxis, Vehicle,
};
