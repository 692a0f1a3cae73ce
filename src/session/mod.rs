//! Drone session: lifecycle, coordinator loop, setup and delegates

mod coordinator;
pub mod delegate;
pub mod payload;
#[allow(clippy::module_inception)]
mod session;
pub mod setup;
pub mod state;
pub mod status;

pub use coordinator::Coordinator;
pub use delegate::{SessionDelegate, SessionNotifier};
pub use payload::PayloadReset;
pub use session::DroneSession;
pub use setup::{SetupStep, SetupStepper};
pub use state::{ControllerSettings, SessionState};
