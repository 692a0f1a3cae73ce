//! Drone session
//!
//! The session owns everything tied to one vehicle connection: the
//! telemetry store, the command executor, the coordinator loop and the
//! setup tasks. It is the only surface mission logic talks to.

use drone_shared::{
    BatteryState, CameraFile, CameraState, Channel, CommandId, ControllerState, GeoCoordinate,
    GimbalState, KernelCommand, Message, Orientation, RemoteControllerState, SessionError,
    VehicleDetails,
};
use std::sync::{Arc, Weak};
use std::time::SystemTime;
use tracing::{info, warn};

use super::coordinator::Coordinator;
use super::delegate::{SessionDelegate, SessionNotifier};
use super::payload::PayloadReset;
use super::setup::{fetch_details, SetupStepper};
use super::state::SessionState;
use super::status;
use crate::command::handlers::HandlerContext;
use crate::command::{CommandConfig, CommandExecutor};
use crate::config::SessionConfig;
use crate::control::{ExecutionEngine, VirtualStickSession};
use crate::hardware::{ConnectionListener, Vehicle};
use crate::telemetry::{Timestamped, TelemetryStore};

/// Closes the session when the vehicle connection breaks. Holds a
/// reference to the session, not ownership of it.
struct ConnectionWatcher {
    session: Weak<DroneSession>,
}

impl ConnectionListener for ConnectionWatcher {
    fn on_connection_lost(&self) {
        if let Some(session) = self.session.upgrade() {
            warn!("[SESSION] Connection lost");
            session.close();
        }
    }
}

pub struct DroneSession {
    vehicle: Arc<dyn Vehicle>,
    config: Arc<SessionConfig>,
    state: Arc<SessionState>,
    telemetry: Arc<TelemetryStore>,
    notifier: Arc<SessionNotifier>,
    executor: Arc<CommandExecutor>,
    payloads: PayloadReset,
}

impl DroneSession {
    /// Open a session on `vehicle` and start its background tasks.
    /// Must be called from within a tokio runtime.
    pub fn open(vehicle: Arc<dyn Vehicle>, config: SessionConfig) -> Arc<Self> {
        let config = Arc::new(config);
        let notifier = Arc::new(SessionNotifier::new(config.session_id.clone()));
        let state = Arc::new(SessionState::new());
        let telemetry = Arc::new(TelemetryStore::new(notifier.clone()));

        vehicle.add_controller_listener(telemetry.clone());
        vehicle.add_battery_listener(telemetry.clone());
        vehicle.add_camera_listener(telemetry.clone());
        vehicle.add_gimbal_listener(telemetry.clone());
        vehicle.add_remote_controller_listener(telemetry.clone());

        let executor = Arc::new(CommandExecutor::new(
            HandlerContext {
                vehicle: vehicle.clone(),
                telemetry: telemetry.clone(),
                config: config.clone(),
            },
            notifier.clone(),
        ));
        let payloads = PayloadReset::new(vehicle.clone(), telemetry.clone(), config.clone());

        let session = Arc::new_cyclic(|weak: &Weak<DroneSession>| {
            vehicle.add_connection_listener(Arc::new(ConnectionWatcher {
                session: weak.clone(),
            }));
            DroneSession {
                vehicle: vehicle.clone(),
                config: config.clone(),
                state: state.clone(),
                telemetry: telemetry.clone(),
                notifier: notifier.clone(),
                executor: executor.clone(),
                payloads,
            }
        });

        info!("[SESSION] Opened {}", config.session_id);

        match vehicle.flight_control() {
            Some(fc) => {
                tokio::spawn(fetch_details(
                    fc.clone(),
                    state.clone(),
                    config.details_max_attempts,
                ));

                let stepper = SetupStepper::new(fc, state.clone(), config.clone());
                tokio::spawn(async move {
                    if let Err(e) = stepper.run().await {
                        warn!("[SETUP] Incomplete: {}", e);
                    }
                });
            }
            None => warn!("[SESSION] Flight controller unavailable"),
        }

        Coordinator::new(vehicle, state, telemetry, executor, notifier, config).start();

        session
    }

    pub fn id(&self) -> String {
        self.notifier.id()
    }

    /// Reassign the id reported to delegates
    pub fn identify(&self, id: impl Into<String>) {
        self.notifier.set_id(id);
    }

    pub fn opened(&self) -> SystemTime {
        self.state.opened()
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    /// Close the session. The coordinator stops at its next tick and
    /// queued commands are dropped without callbacks.
    pub fn close(&self) {
        if self.state.close() {
            info!("[SESSION] Closed {}", self.id());
            self.notifier.closed();
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_initialized()
    }

    pub fn is_located(&self) -> bool {
        self.state.is_located()
    }

    pub fn details(&self) -> Option<VehicleDetails> {
        Some(VehicleDetails {
            serial_number: self.state.serial_number()?,
            firmware_version: self.state.firmware_version()?,
            model: self.vehicle.model(),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // Commands

    /// Queue `command` with the default configuration
    pub fn add(&self, command: KernelCommand) -> Result<CommandId, SessionError> {
        self.add_with_config(command, None)
    }

    pub fn add_with_config(
        &self,
        command: KernelCommand,
        config: Option<CommandConfig>,
    ) -> Result<CommandId, SessionError> {
        if self.is_closed() {
            return Err(SessionError::SessionClosed);
        }
        self.executor.add(command, config)
    }

    /// Drop every queued command. Commands already executing still finish.
    pub fn remove_commands(&self) {
        self.executor.remove_all();
    }

    pub fn pending_commands(&self) -> usize {
        self.executor.pending_count()
    }

    // Delegates

    /// Register `delegate`, replaying the one-shot notifications it missed
    pub fn add_delegate(&self, delegate: Arc<dyn SessionDelegate>) {
        let (initialized, located) = self.notifier.add_with_replay(delegate.clone(), || {
            (self.state.is_initialized(), self.state.is_located())
        });

        let id = self.id();
        if initialized {
            delegate.on_initialized(&id);
        }
        if located {
            delegate.on_located(&id);
        }
    }

    pub fn remove_delegate(&self, delegate: &Arc<dyn SessionDelegate>) {
        self.notifier.remove(delegate);
    }

    // Telemetry

    pub fn controller_state(&self) -> Option<Timestamped<ControllerState>> {
        self.telemetry.controller_state()
    }

    pub fn battery_state(&self) -> Option<Timestamped<BatteryState>> {
        self.telemetry.battery_state()
    }

    pub fn camera_state(&self, channel: Channel) -> Option<Timestamped<CameraState>> {
        self.telemetry.camera_state(channel)
    }

    pub fn gimbal_state(&self, channel: Channel) -> Option<Timestamped<GimbalState>> {
        self.telemetry.gimbal_state(channel)
    }

    pub fn remote_controller_state(
        &self,
        channel: Channel,
    ) -> Option<Timestamped<RemoteControllerState>> {
        self.telemetry.remote_controller_state(channel)
    }

    pub fn most_recent_camera_file(&self) -> Option<Timestamped<CameraFile>> {
        self.telemetry.most_recent_camera_file()
    }

    fn controller(&self) -> Option<ControllerState> {
        self.telemetry.controller_state().map(|state| state.value)
    }

    pub fn is_flying(&self) -> bool {
        self.controller().map(|s| s.flying).unwrap_or(false)
    }

    pub fn is_returning_home(&self) -> bool {
        self.controller().map(|s| s.returning_home).unwrap_or(false)
    }

    pub fn is_landing(&self) -> bool {
        self.controller().map(|s| s.is_landing()).unwrap_or(false)
    }

    /// Absent while the GPS signal is weak
    pub fn location(&self) -> Option<GeoCoordinate> {
        self.controller()?.location()
    }

    pub fn home_location(&self) -> Option<GeoCoordinate> {
        self.controller()?.home_location
    }

    pub fn last_ground_location(&self) -> Option<GeoCoordinate> {
        self.state.last_ground_location()
    }

    /// Where the current flight started: the last position seen on the
    /// ground, falling back to home. On the ground it is the current
    /// location.
    pub fn takeoff_location(&self) -> Option<GeoCoordinate> {
        if self.is_flying() {
            self.last_ground_location().or_else(|| self.home_location())
        } else {
            self.location()
        }
    }

    /// Meters above takeoff
    pub fn altitude(&self) -> f64 {
        self.controller().map(|s| s.altitude).unwrap_or(0.0)
    }

    pub fn horizontal_speed(&self) -> f64 {
        self.controller().map(|s| s.horizontal_speed()).unwrap_or(0.0)
    }

    pub fn vertical_speed(&self) -> f64 {
        self.controller().map(|s| s.vertical_speed()).unwrap_or(0.0)
    }

    pub fn course(&self) -> f64 {
        self.controller().map(|s| s.course()).unwrap_or(0.0)
    }

    pub fn orientation(&self) -> Orientation {
        self.controller().map(|s| s.orientation).unwrap_or_default()
    }

    pub fn gps_satellites(&self) -> Option<u32> {
        self.controller()?.satellite_count
    }

    /// Remaining battery as a fraction, 0.0 to 1.0
    pub fn battery_percent(&self) -> Option<f64> {
        self.telemetry
            .battery_state()
            .map(|state| f64::from(state.value.remaining_percent) / 100.0)
    }

    pub fn low_battery_threshold(&self) -> Option<f64> {
        self.state.settings().low_battery_threshold
    }

    pub fn return_home_altitude(&self) -> Option<f64> {
        self.state.settings().return_home_altitude
    }

    pub fn max_altitude(&self) -> Option<f64> {
        self.state.settings().max_altitude
    }

    pub fn status_messages(&self) -> Vec<Message> {
        status::status_messages(self.controller().as_ref())
    }

    pub fn disengage_reason(&self) -> Option<Message> {
        status::disengage_reason(
            self.is_closed(),
            self.vehicle.flight_control().is_some(),
            self.controller().as_ref(),
        )
    }

    // Control

    pub fn create_control_session(
        &self,
        engine: ExecutionEngine,
    ) -> Result<VirtualStickSession, SessionError> {
        match engine {
            ExecutionEngine::Kernel => Ok(VirtualStickSession::new(
                self.vehicle.clone(),
                self.telemetry.clone(),
                self.payloads.clone(),
            )),
            ExecutionEngine::Vendor => {
                Err(SessionError::ControlEngineUnsupported(engine.to_string()))
            }
        }
    }

    pub fn reset_payloads(&self) {
        self.payloads.reset(true, true);
    }

    pub fn reset_payloads_with(&self, gimbal: bool, camera: bool) {
        self.payloads.reset(gimbal, camera);
    }
}

// The coordinator and setup tasks hold only the session's parts, so they
// stop once the last handle is gone.
impl Drop for DroneSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{SimDevices, SimulatedVehicle};
    use drone_shared::{
        BatteryState, CameraCommand, CameraCommandKind, CameraMode, CameraSystemState,
        DroneCommand, GimbalCommand, GimbalCommandKind, GimbalMode,
    };
    use parking_lot::Mutex;
    use tokio::time::Duration;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn events(&self) -> Vec<String> {
            self.events.lock().clone()
        }
    }

    impl SessionDelegate for Recorder {
        fn on_initialized(&self, session_id: &str) {
            self.events.lock().push(format!("initialized {}", session_id));
        }

        fn on_located(&self, session_id: &str) {
            self.events.lock().push(format!("located {}", session_id));
        }

        fn on_command_finished(
            &self,
            _session_id: &str,
            id: CommandId,
            _command: &KernelCommand,
            result: &Result<(), SessionError>,
        ) {
            self.events
                .lock()
                .push(format!("finished {} {}", id, result.is_ok()));
        }

        fn on_camera_file_generated(&self, _session_id: &str, file: &CameraFile) {
            self.events.lock().push(format!("file {}", file.name));
        }

        fn on_closed(&self, session_id: &str) {
            self.events.lock().push(format!("closed {}", session_id));
        }
    }

    fn here(latitude: f64) -> GeoCoordinate {
        GeoCoordinate {
            latitude,
            longitude: 8.0,
        }
    }

    fn open(vehicle: &SimulatedVehicle) -> Arc<DroneSession> {
        DroneSession::open(Arc::new(vehicle.clone()), SessionConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_initializes_and_configures() {
        let vehicle = SimulatedVehicle::new();
        let session = open(&vehicle);
        let recorder = Arc::new(Recorder::default());
        session.add_delegate(recorder.clone());

        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(session.is_initialized());
        assert_eq!(recorder.events(), vec!["initialized session-001"]);
        let details = session.details().unwrap();
        assert_eq!(details.serial_number, "SIM-0001");
        assert_eq!(details.model.as_deref(), Some("Simulator"));

        assert_eq!(session.low_battery_threshold(), Some(0.25));
        assert_eq!(session.max_altitude(), Some(120.0));
        assert!(!vehicle.beginner_mode());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_delegate_gets_replay() {
        let vehicle = SimulatedVehicle::new();
        let session = open(&vehicle);
        vehicle.emit_controller_state(ControllerState {
            position: Some(here(47.0)),
            ..Default::default()
        });
        tokio::time::sleep(Duration::from_secs(1)).await;

        session.identify("flight-7");
        let recorder = Arc::new(Recorder::default());
        session.add_delegate(recorder.clone());

        assert_eq!(
            recorder.events(),
            vec!["initialized flight-7", "located flight-7"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_flow_through_queues() {
        let vehicle = SimulatedVehicle::new();
        let session = open(&vehicle);
        let recorder = Arc::new(Recorder::default());
        session.add_delegate(recorder.clone());
        vehicle.emit_gimbal_state(
            0,
            GimbalState {
                mode: GimbalMode::YawFollow,
                ..Default::default()
            },
        );
        vehicle.emit_camera_system_state(
            0,
            CameraSystemState {
                mode: CameraMode::Photo,
                ..Default::default()
            },
        );

        let takeoff = session.add(KernelCommand::Drone(DroneCommand::Takeoff)).unwrap();
        let pitch = session
            .add(KernelCommand::Gimbal(GimbalCommand {
                channel: 0,
                kind: GimbalCommandKind::Orientation(drone_shared::GimbalOrientation {
                    pitch: Some(-0.5),
                    ..Default::default()
                }),
            }))
            .unwrap();
        let photo = session
            .add(KernelCommand::Camera(CameraCommand {
                channel: 0,
                kind: CameraCommandKind::StartCapture {
                    verify_file_created: true,
                },
            }))
            .unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;

        let events = recorder.events();
        assert!(events.contains(&format!("finished {} true", takeoff)));
        assert!(events.contains(&format!("finished {} true", pitch)));
        assert!(events.contains(&format!("finished {} true", photo)));
        assert!(events.iter().any(|e| e.starts_with("file ")));
        assert!(session.most_recent_camera_file().is_some());
        assert!(session.is_flying());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_device_rejected() {
        let vehicle = SimulatedVehicle::with_devices(SimDevices {
            gimbals: vec![],
            ..Default::default()
        });
        let session = open(&vehicle);

        let result = session.add(KernelCommand::Gimbal(GimbalCommand {
            channel: 0,
            kind: GimbalCommandKind::Mode(GimbalMode::Free),
        }));
        assert!(matches!(result, Err(SessionError::DeviceUnavailable { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_takeoff_location() {
        let vehicle = SimulatedVehicle::new();
        let session = open(&vehicle);
        vehicle.emit_controller_state(ControllerState {
            position: Some(here(47.0)),
            home_location: Some(here(46.0)),
            ..Default::default()
        });
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(session.takeoff_location().map(|l| l.latitude), Some(47.0));

        vehicle.update_controller(|s| {
            s.flying = true;
            s.position = Some(here(47.2));
        });
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(session.takeoff_location().map(|l| l.latitude), Some(47.0));
        assert_eq!(session.location().map(|l| l.latitude), Some(47.2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_and_disengage() {
        let vehicle = SimulatedVehicle::new();
        let session = open(&vehicle);
        assert_eq!(session.status_messages()[0].title, "Telemetry unavailable");
        assert_eq!(
            session.disengage_reason().map(|m| m.title).as_deref(),
            Some("Telemetry unavailable")
        );

        vehicle.emit_controller_state(ControllerState {
            position: Some(here(47.0)),
            home_location: Some(here(47.0)),
            ..Default::default()
        });
        vehicle.emit_battery_state(BatteryState {
            remaining_percent: 80,
            ..Default::default()
        });
        assert!(session.status_messages().is_empty());
        assert!(session.disengage_reason().is_none());
        assert_eq!(session.battery_percent(), Some(0.8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_loss_closes() {
        let vehicle = SimulatedVehicle::new();
        let session = open(&vehicle);
        let recorder = Arc::new(Recorder::default());
        session.add_delegate(recorder.clone());

        vehicle.drop_connection();

        assert!(session.is_closed());
        assert!(recorder.events().contains(&"closed session-001".to_string()));
        assert_eq!(
            session.disengage_reason().map(|m| m.title).as_deref(),
            Some("Vehicle disconnected")
        );
        assert!(matches!(
            session.add(KernelCommand::Drone(DroneCommand::Takeoff)),
            Err(SessionError::SessionClosed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_session_stops_coordinator() {
        let vehicle = SimulatedVehicle::new();
        let session = open(&vehicle);
        let recorder = Arc::new(Recorder::default());
        session.add_delegate(recorder.clone());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(vehicle.calls("exposure_mode") >= 1);

        drop(session);
        assert!(recorder.events().contains(&"closed session-001".to_string()));

        tokio::time::sleep(Duration::from_millis(200)).await;
        let polls = vehicle.calls("exposure_mode");
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(vehicle.calls("exposure_mode"), polls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_control_session_engines() {
        let vehicle = SimulatedVehicle::new();
        let session = open(&vehicle);

        assert!(session.create_control_session(ExecutionEngine::Kernel).is_ok());
        assert!(matches!(
            session.create_control_session(ExecutionEngine::Vendor),
            Err(SessionError::ControlEngineUnsupported(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_session_abandons_queue() {
        let vehicle = SimulatedVehicle::new();
        vehicle.set_latency(Duration::from_secs(1));
        let session = open(&vehicle);
        let recorder = Arc::new(Recorder::default());
        session.add_delegate(recorder.clone());

        let first = session.add(KernelCommand::Drone(DroneCommand::Takeoff)).unwrap();
        session.add(KernelCommand::Drone(DroneCommand::StartLanding)).unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        session.close();
        tokio::time::sleep(Duration::from_secs(3)).await;

        let finished: Vec<String> = recorder
            .events()
            .into_iter()
            .filter(|e| e.starts_with("finished"))
            .collect();
        assert_eq!(finished, vec![format!("finished {} true", first)]);
        assert_eq!(vehicle.calls("start_landing"), 0);
    }
}
