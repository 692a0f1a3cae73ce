//! Command executor - validates, routes and processes kernel commands

use drone_shared::{CommandCategory, CommandId, KernelCommand, SessionError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use super::handlers::{self, HandlerContext};
use super::queue::{Command, CommandConfig, CommandQueue};
use super::router::MultiChannelCommandQueue;
use crate::session::delegate::SessionNotifier;

/// Owns the vehicle-wide queue and the per-channel routers
pub struct CommandExecutor {
    next_id: AtomicU64,
    context: HandlerContext,
    notifier: Arc<SessionNotifier>,
    drone: CommandQueue,
    remote_controller: MultiChannelCommandQueue,
    camera: MultiChannelCommandQueue,
    gimbal: MultiChannelCommandQueue,
}

impl CommandExecutor {
    pub fn new(context: HandlerContext, notifier: Arc<SessionNotifier>) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            context,
            notifier,
            drone: CommandQueue::new("drone"),
            remote_controller: MultiChannelCommandQueue::new("remote controller"),
            camera: MultiChannelCommandQueue::new("camera"),
            gimbal: MultiChannelCommandQueue::new("gimbal"),
        }
    }

    /// Defaults applied to every command: retry anything the hardware did
    /// not report as unsupported, and let mode changes settle
    pub fn default_config(&self, command: &KernelCommand) -> CommandConfig {
        let config = &self.context.config;
        let mut defaults = CommandConfig::default()
            .with_retries(|error| !error.is_unsupported())
            .with_max_attempts(config.command_max_attempts);
        if command.is_mode_change() {
            defaults = defaults.with_finish_delay(config.mode_finish_delay);
        }
        defaults
    }

    /// Validate the target device and enqueue `command`
    pub fn add(
        &self,
        command: KernelCommand,
        config: Option<CommandConfig>,
    ) -> Result<CommandId, SessionError> {
        self.check_device(&command)?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let config = config.unwrap_or_default().or(self.default_config(&command));
        let label = command.name();
        let category = command.category();
        let channel = command.channel().unwrap_or_default();

        let execute = {
            let context = self.context.clone();
            let notifier = self.notifier.clone();
            let command = command.clone();
            Box::new(move || {
                notifier.command_executed(id, &command);
                handlers::execute(&context, &command)
            })
        };
        let finished = {
            let notifier = self.notifier.clone();
            Box::new(move |result: Result<(), SessionError>| {
                if let Err(error) = &result {
                    info!("[COMMAND] {} ({}) failed: {}", command.name(), id, error);
                }
                notifier.command_finished(id, &command, &result);
            })
        };
        let queued = Command::new(id, label, execute, finished, config);

        match category {
            CommandCategory::Drone => self.drone.add(queued)?,
            CommandCategory::RemoteController => self.remote_controller.add(channel, queued)?,
            CommandCategory::Camera => self.camera.add(channel, queued)?,
            CommandCategory::Gimbal => self.gimbal.add(channel, queued)?,
        }

        debug!("[COMMAND] Added {} ({})", label, id);
        Ok(id)
    }

    fn check_device(&self, command: &KernelCommand) -> Result<(), SessionError> {
        let vehicle = &self.context.vehicle;
        let channel = command.channel();
        let present = match (command.category(), channel) {
            (CommandCategory::Drone, _) => vehicle.flight_control().is_some(),
            (CommandCategory::RemoteController, Some(c)) => vehicle.has_remote_controller(c),
            (CommandCategory::Camera, Some(c)) => vehicle.camera(c).is_some(),
            (CommandCategory::Gimbal, Some(c)) => vehicle.gimbal(c).is_some(),
            (_, None) => false,
        };
        if present {
            Ok(())
        } else {
            Err(SessionError::DeviceUnavailable {
                category: command.category(),
                channel,
            })
        }
    }

    /// One scheduling slot for every queue, in fixed category order
    pub fn process_all(&self) {
        self.drone.process();
        self.remote_controller.process();
        self.camera.process();
        self.gimbal.process();
    }

    pub fn remove_all(&self) {
        self.drone.remove_all();
        self.remote_controller.remove_all();
        self.camera.remove_all();
        self.gimbal.remove_all();
    }

    pub fn close(&self) {
        self.drone.close();
        self.remote_controller.close();
        self.camera.close();
        self.gimbal.close();
    }

    /// Queued commands across every queue
    pub fn pending_count(&self) -> usize {
        self.drone.len() + self.remote_controller.len() + self.camera.len() + self.gimbal.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::hardware::{SimulatedVehicle, Vehicle};
    use crate::session::delegate::SessionDelegate;
    use crate::telemetry::TelemetryStore;
    use drone_shared::{
        CameraCommand, CameraCommandKind, CameraMode, CameraSystemState, DroneCommand,
        HardwareError, RemoteControllerCommand, RemoteControllerCommandKind,
    };
    use parking_lot::Mutex;
    use tokio::time::Duration;

    #[derive(Default)]
    struct Recorder {
        executed: Mutex<Vec<CommandId>>,
        finished: Mutex<Vec<(CommandId, Result<(), SessionError>)>>,
    }

    impl SessionDelegate for Recorder {
        fn on_command_executed(&self, _session_id: &str, id: CommandId, _command: &KernelCommand) {
            self.executed.lock().push(id);
        }

        fn on_command_finished(
            &self,
            _session_id: &str,
            id: CommandId,
            _command: &KernelCommand,
            result: &Result<(), SessionError>,
        ) {
            self.finished.lock().push((id, result.clone()));
        }
    }

    fn executor() -> (CommandExecutor, SimulatedVehicle, Arc<Recorder>) {
        let vehicle = SimulatedVehicle::new();
        let notifier = Arc::new(SessionNotifier::new("test"));
        let recorder = Arc::new(Recorder::default());
        notifier.add(recorder.clone());
        let telemetry = Arc::new(TelemetryStore::new(notifier.clone()));
        vehicle.add_camera_listener(telemetry.clone());
        vehicle.add_controller_listener(telemetry.clone());

        let context = HandlerContext {
            vehicle: Arc::new(vehicle.clone()),
            telemetry,
            config: Arc::new(SessionConfig::default()),
        };
        (CommandExecutor::new(context, notifier), vehicle, recorder)
    }

    async fn run(executor: &CommandExecutor, ticks: usize) {
        for _ in 0..ticks {
            executor.process_all();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_device_rejected_at_add() {
        let (executor, _, _) = executor();
        let result = executor.add(
            KernelCommand::Camera(CameraCommand {
                channel: 3,
                kind: CameraCommandKind::StopCapture,
            }),
            None,
        );
        assert!(matches!(
            result,
            Err(SessionError::DeviceUnavailable { channel: Some(3), .. })
        ));
        assert_eq!(executor.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_notifications() {
        let (executor, vehicle, recorder) = executor();
        let id = executor
            .add(KernelCommand::Drone(DroneCommand::Takeoff), None)
            .unwrap();

        run(&executor, 2).await;

        assert_eq!(*recorder.executed.lock(), vec![id]);
        assert_eq!(recorder.finished.lock().len(), 1);
        assert!(recorder.finished.lock()[0].1.is_ok());
        assert_eq!(vehicle.calls("start_takeoff"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_retries_recoverable_errors() {
        let (executor, vehicle, recorder) = executor();
        vehicle.fail_next(
            "start_landing",
            HardwareError::new(drone_shared::HardwareErrorCode::Busy, "busy"),
            2,
        );

        executor
            .add(KernelCommand::Drone(DroneCommand::StartLanding), None)
            .unwrap();
        run(&executor, 5).await;

        assert_eq!(vehicle.calls("start_landing"), 3);
        let finished = recorder.finished.lock();
        assert_eq!(finished.len(), 1);
        assert!(finished[0].1.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_gives_up_on_unsupported() {
        let (executor, vehicle, recorder) = executor();
        vehicle.fail_always(
            "start_compass_calibration",
            HardwareError::not_supported("compass calibration"),
        );

        executor
            .add(KernelCommand::Drone(DroneCommand::StartCompassCalibration), None)
            .unwrap();
        run(&executor, 5).await;

        assert_eq!(vehicle.calls("start_compass_calibration"), 1);
        assert!(matches!(
            recorder.finished.lock()[0].1,
            Err(SessionError::CapabilityUnsupported(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mode_change_gets_finish_delay() {
        let (executor, vehicle, recorder) = executor();
        vehicle.emit_camera_system_state(0, CameraSystemState::default());

        let mode = executor
            .add(
                KernelCommand::Camera(CameraCommand {
                    channel: 0,
                    kind: CameraCommandKind::Mode(CameraMode::Video),
                }),
                None,
            )
            .unwrap();
        let stop = executor
            .add(
                KernelCommand::Camera(CameraCommand {
                    channel: 0,
                    kind: CameraCommandKind::StopCapture,
                }),
                None,
            )
            .unwrap();

        run(&executor, 10).await;
        let finished: Vec<_> = recorder.finished.lock().iter().map(|(id, _)| *id).collect();
        assert!(finished.is_empty());

        run(&executor, 10).await;
        let finished: Vec<_> = recorder.finished.lock().iter().map(|(id, _)| *id).collect();
        assert_eq!(finished, vec![mode, stop]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_controller_commands_unhandled() {
        let (executor, _, recorder) = executor();
        executor
            .add(
                KernelCommand::RemoteController(RemoteControllerCommand {
                    channel: 0,
                    kind: RemoteControllerCommandKind::TargetGimbalChannel(1),
                }),
                None,
            )
            .unwrap();
        run(&executor, 2).await;

        assert!(matches!(
            recorder.finished.lock()[0].1,
            Err(SessionError::CommandTypeUnhandled(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_executor_rejects() {
        let (executor, _, _) = executor();
        executor.close();
        let result = executor.add(KernelCommand::Drone(DroneCommand::Takeoff), None);
        assert!(matches!(result, Err(SessionError::SessionClosed)));
    }
}
