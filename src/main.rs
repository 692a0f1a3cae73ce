use anyhow::{bail, Context};
use drone_session::hardware::SimulatedVehicle;
use drone_session::{DroneSession, ExecutionEngine, SessionConfig, SessionDelegate};
use drone_shared::{
    BatteryState, CameraCommand, CameraCommandKind, CameraFile, CameraMode, CameraSystemState,
    CommandId, ControllerState, DroneCommand, FlightMode, GeoCoordinate, GimbalCommand,
    GimbalCommandKind, GimbalMode, GimbalOrientation, GimbalState, KernelCommand, SessionError,
};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Logs session events
struct LogDelegate;

impl SessionDelegate for LogDelegate {
    fn on_initialized(&self, session_id: &str) {
        info!("[MAIN] {} initialized", session_id);
    }

    fn on_located(&self, session_id: &str) {
        info!("[MAIN] {} located", session_id);
    }

    fn on_command_finished(
        &self,
        _session_id: &str,
        id: CommandId,
        command: &KernelCommand,
        result: &Result<(), SessionError>,
    ) {
        match result {
            Ok(()) => info!("[MAIN] {} ({}) finished", command.name(), id),
            Err(e) => warn!("[MAIN] {} ({}) failed: {}", command.name(), id, e),
        }
    }

    fn on_camera_file_generated(&self, _session_id: &str, file: &CameraFile) {
        info!("[MAIN] New file {} ({} bytes)", file.name, file.size_bytes);
    }

    fn on_closed(&self, session_id: &str) {
        info!("[MAIN] {} closed", session_id);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let vehicle = SimulatedVehicle::new();
    vehicle.set_latency(Duration::from_millis(50));

    let config = SessionConfig {
        session_id: "sim-session".into(),
        ..Default::default()
    };
    let session = DroneSession::open(Arc::new(vehicle.clone()), config);
    session.add_delegate(Arc::new(LogDelegate));

    // Initial telemetry as a landed vehicle would report it
    let home = GeoCoordinate {
        latitude: 47.3977,
        longitude: 8.5456,
    };
    vehicle.emit_controller_state(ControllerState {
        position: Some(home),
        home_location: Some(home),
        satellite_count: Some(14),
        ..Default::default()
    });
    vehicle.emit_battery_state(BatteryState {
        remaining_percent: 92,
        voltage: 16.4,
        temperature: 24.0,
    });
    vehicle.emit_camera_system_state(
        0,
        CameraSystemState {
            mode: CameraMode::Video,
            ..Default::default()
        },
    );
    vehicle.emit_gimbal_state(
        0,
        GimbalState {
            mode: GimbalMode::YawFollow,
            ..Default::default()
        },
    );

    sleep(Duration::from_secs(2)).await;
    if !session.is_initialized() {
        bail!("session did not initialize");
    }
    for message in session.status_messages() {
        info!("[MAIN] Status: {}", message);
    }

    let control = session
        .create_control_session(ExecutionEngine::Kernel)
        .context("creating control session")?;
    let activated = loop {
        if let Some(result) = control.activate() {
            break result;
        }
        sleep(Duration::from_millis(100)).await;
    };
    if !activated {
        let reason = control
            .disengage_reason()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "unknown".into());
        error!("[MAIN] Activation failed: {}", reason);
        session.close();
        bail!("activation failed: {}", reason);
    }
    info!(
        "[MAIN] Airborne, takeoff location {:?}",
        session.takeoff_location()
    );

    session.add(KernelCommand::Camera(CameraCommand {
        channel: 0,
        kind: CameraCommandKind::Mode(CameraMode::Photo),
    }))?;
    session.add(KernelCommand::Gimbal(GimbalCommand {
        channel: 0,
        kind: GimbalCommandKind::Orientation(GimbalOrientation {
            pitch: Some(-std::f64::consts::FRAC_PI_2),
            ..Default::default()
        }),
    }))?;
    session.add(KernelCommand::Camera(CameraCommand {
        channel: 0,
        kind: CameraCommandKind::StartCapture {
            verify_file_created: true,
        },
    }))?;

    while session.pending_commands() > 0 {
        sleep(Duration::from_millis(250)).await;
    }
    sleep(Duration::from_secs(3)).await;

    session.reset_payloads();
    session.add(KernelCommand::Drone(DroneCommand::StartLanding))?;
    sleep(Duration::from_secs(1)).await;
    vehicle.update_controller(|s| {
        s.flying = false;
        s.motors_running = false;
        s.flight_mode = FlightMode::Landed;
    });

    session.close();
    sleep(Duration::from_millis(200)).await;
    info!("[MAIN] Done");
    Ok(())
}
