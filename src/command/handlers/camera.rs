//! Camera command handler
//!
//! Settings are applied only when they differ from the cached or read-back
//! value. Capture actions are followed by verification loops that poll the
//! cached camera state until the camera reflects the action.

use drone_shared::{
    CameraCommand, CameraCommandKind, CameraMode, CameraState, Channel, CommandCategory,
    SessionError,
};
use futures::FutureExt;
use std::sync::Arc;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use super::{conditionally, HandlerContext};
use crate::command::queue::{CommandFuture, CommandResult};
use crate::config::SessionConfig;
use crate::telemetry::TelemetryStore;

pub fn execute(ctx: &HandlerContext, command: &CameraCommand) -> Result<CommandFuture, SessionError> {
    let channel = command.channel;
    let camera = ctx.vehicle.camera(channel).ok_or_else(|| unavailable(channel))?;
    let state = ctx
        .telemetry
        .camera_state(channel)
        .ok_or_else(|| unavailable(channel))?
        .value;
    let exposure = state.exposure_parameters.clone();

    let future = match command.kind.clone() {
        CameraCommandKind::Mode(mode) => {
            let current = state.system.mode;
            async move { conditionally(mode != current, || camera.set_mode(mode)).await }.boxed()
        }
        CameraCommandKind::PhotoMode(mode) => {
            let current = state.system.photo_mode;
            async move { conditionally(Some(mode) != current, || camera.set_photo_mode(mode)).await }
                .boxed()
        }
        CameraCommandKind::ExposureMode(mode) => {
            let telemetry = ctx.telemetry.clone();
            async move {
                let current = camera.exposure_mode().await?;
                if current == mode {
                    return Ok(());
                }
                let result = camera.set_exposure_mode(mode).await;
                telemetry.invalidate_exposure_mode(channel);
                result.map_err(SessionError::from)
            }
            .boxed()
        }
        CameraCommandKind::ExposureCompensation(value) => {
            let current = exposure.map(|p| p.exposure_compensation);
            async move {
                conditionally(current != Some(value), || camera.set_exposure_compensation(value)).await
            }
            .boxed()
        }
        CameraCommandKind::Iso(value) => {
            let current = exposure.map(|p| p.iso);
            async move { conditionally(current != Some(value), || camera.set_iso(value)).await }.boxed()
        }
        CameraCommandKind::ShutterSpeed(value) => {
            let current = exposure.map(|p| p.shutter_speed);
            async move { conditionally(current != Some(value), || camera.set_shutter_speed(value)).await }
                .boxed()
        }
        CameraCommandKind::Aperture(value) => {
            let current = exposure.map(|p| p.aperture);
            async move { conditionally(current != Some(value), || camera.set_aperture(value)).await }
                .boxed()
        }
        CameraCommandKind::AutoLockGimbal(enabled) => async move {
            let current = camera.auto_lock_gimbal().await?;
            conditionally(current != enabled, || camera.set_auto_lock_gimbal(enabled)).await
        }
        .boxed(),
        CameraCommandKind::PhotoInterval(seconds) => async move {
            let current = camera.photo_interval().await?;
            conditionally(current != seconds, || camera.set_photo_interval(seconds)).await
        }
        .boxed(),
        CameraCommandKind::StartCapture {
            verify_file_created,
        } => {
            let telemetry = ctx.telemetry.clone();
            let config = ctx.config.clone();
            match state.system.mode {
                CameraMode::Photo if state.system.is_capturing_photo_interval() => {
                    debug!("[CAMERA] Start capture skipped, already shooting interval photos");
                    async { Ok(()) }.boxed()
                }
                CameraMode::Photo => async move {
                    info!("[CAMERA] Start capture photo on channel {}", channel);
                    let started = Instant::now();
                    camera.start_shoot_photo().await?;
                    // Busy flags lag the request
                    sleep(config.capture_start_settle).await;
                    if verify_file_created {
                        wait_for_new_file(&telemetry, &config, channel, started).await?;
                    }
                    wait_not_busy(&telemetry, &config, channel).await
                }
                .boxed(),
                CameraMode::Video if state.system.is_capturing_video() => {
                    debug!("[CAMERA] Start capture skipped, already recording video");
                    async { Ok(()) }.boxed()
                }
                CameraMode::Video => async move {
                    info!("[CAMERA] Start capture video on channel {}", channel);
                    camera.start_record_video().await?;
                    sleep(config.capture_start_settle).await;
                    wait_not_busy(&telemetry, &config, channel).await
                }
                .boxed(),
                mode => {
                    info!("[CAMERA] Start capture invalid mode: {:?}", mode);
                    return Err(SessionError::InvalidCameraMode);
                }
            }
        }
        CameraCommandKind::StopCapture => {
            let telemetry = ctx.telemetry.clone();
            let config = ctx.config.clone();
            match state.system.mode {
                CameraMode::Photo if state.system.is_capturing_photo_interval() => async move {
                    info!("[CAMERA] Stop capture interval photo on channel {}", channel);
                    camera.stop_shoot_photo().await?;
                    wait_not_capturing(&telemetry, &config, channel).await
                }
                .boxed(),
                CameraMode::Video if state.system.is_capturing_video() => async move {
                    info!("[CAMERA] Stop capture video on channel {}", channel);
                    camera.stop_record_video().await?;
                    wait_not_capturing(&telemetry, &config, channel).await
                }
                .boxed(),
                mode => {
                    debug!("[CAMERA] Stop capture skipped, not capturing in {:?} mode", mode);
                    async { Ok(()) }.boxed()
                }
            }
        }
        CameraCommandKind::FocusMode(_) => {
            return Err(SessionError::CommandTypeUnhandled("focus mode"));
        }
    };

    Ok(future)
}

fn unavailable(channel: Channel) -> SessionError {
    SessionError::DeviceUnavailable {
        category: CommandCategory::Camera,
        channel: Some(channel),
    }
}

fn current_state(telemetry: &TelemetryStore, channel: Channel) -> Result<CameraState, SessionError> {
    telemetry
        .camera_state(channel)
        .map(|s| s.value)
        .ok_or_else(|| unavailable(channel))
}

/// Poll until the camera stops capturing; times out with an error
async fn wait_not_capturing(
    telemetry: &Arc<TelemetryStore>,
    config: &SessionConfig,
    channel: Channel,
) -> CommandResult {
    for attempt in 0..config.capture_poll_max_attempts {
        if !current_state(telemetry, channel)?.system.is_capturing() {
            return Ok(());
        }
        debug!(
            "[CAMERA] Waiting for camera {} to stop capturing ({})",
            channel, attempt
        );
        sleep(config.capture_poll_interval).await;
    }
    Err(SessionError::BusyTimeout("camera to stop capturing".into()))
}

/// Poll until a camera file newer than `started` appears; times out with an error
async fn wait_for_new_file(
    telemetry: &Arc<TelemetryStore>,
    config: &SessionConfig,
    channel: Channel,
    started: Instant,
) -> CommandResult {
    for attempt in 0..config.capture_poll_max_attempts {
        if let Some(file) = telemetry.most_recent_camera_file() {
            if file.timestamp >= started {
                debug!("[CAMERA] Found camera file {}", file.value.name);
                return Ok(());
            }
        }
        debug!(
            "[CAMERA] Waiting for camera {} file ({})",
            channel, attempt
        );
        sleep(config.capture_poll_interval).await;
    }
    Err(SessionError::BusyTimeout("new camera file".into()))
}

/// Poll until the camera is idle; gives up quietly at the limit
async fn wait_not_busy(
    telemetry: &Arc<TelemetryStore>,
    config: &SessionConfig,
    channel: Channel,
) -> CommandResult {
    let mut attempt = 0;
    loop {
        let state = current_state(telemetry, channel)?;
        if attempt >= config.not_busy_max_attempts || !state.is_busy() {
            return Ok(());
        }
        attempt += 1;
        sleep(config.not_busy_poll_interval).await;
    }
}
