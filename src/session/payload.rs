//! Best-effort payload resets
//!
//! Requests are fire-and-forget: failures are logged and never retried.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::hardware::{GimbalRotation, Vehicle};
use crate::telemetry::TelemetryStore;

/// Payloads reset by the session always live on channel 0
const PAYLOAD_CHANNEL: drone_shared::Channel = 0;

#[derive(Clone)]
pub struct PayloadReset {
    vehicle: Arc<dyn Vehicle>,
    telemetry: Arc<TelemetryStore>,
    config: Arc<SessionConfig>,
}

impl PayloadReset {
    pub fn new(
        vehicle: Arc<dyn Vehicle>,
        telemetry: Arc<TelemetryStore>,
        config: Arc<SessionConfig>,
    ) -> Self {
        Self {
            vehicle,
            telemetry,
            config,
        }
    }

    pub fn reset(&self, gimbal: bool, camera: bool) {
        if gimbal {
            self.reset_gimbal();
        }
        if camera {
            self.reset_camera();
        }
    }

    /// Level the gimbal to the configured pitch with zero roll.
    /// Returns whether a request was issued.
    pub fn reset_gimbal(&self) -> bool {
        let Some(gimbal) = self.vehicle.gimbal(PAYLOAD_CHANNEL) else {
            return false;
        };
        let rotation = GimbalRotation {
            pitch: Some(self.config.gimbal_reset_pitch),
            roll: Some(0.0),
            yaw: None,
        };

        tokio::spawn(async move {
            if let Err(e) = gimbal.rotate(rotation).await {
                warn!("[SESSION] Gimbal reset failed: {}", e);
            }
        });
        debug!("[SESSION] Gimbal reset requested");
        true
    }

    /// Stop whatever the camera is capturing. Returns whether a request was
    /// issued.
    pub fn reset_camera(&self) -> bool {
        let Some(camera) = self.vehicle.camera(PAYLOAD_CHANNEL) else {
            return false;
        };
        let Some(state) = self.telemetry.camera_state(PAYLOAD_CHANNEL) else {
            return false;
        };
        let system = &state.value.system;

        if system.is_capturing_video() {
            tokio::spawn(async move {
                if let Err(e) = camera.stop_record_video().await {
                    warn!("[SESSION] Stopping video failed: {}", e);
                }
            });
        } else if system.is_capturing() {
            tokio::spawn(async move {
                if let Err(e) = camera.stop_shoot_photo().await {
                    warn!("[SESSION] Stopping photo capture failed: {}", e);
                }
            });
        } else {
            return false;
        }
        debug!("[SESSION] Camera reset requested");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::SimulatedVehicle;
    use crate::session::delegate::SessionNotifier;
    use drone_shared::{CameraMode, CameraSystemState};

    fn payloads(vehicle: &SimulatedVehicle) -> PayloadReset {
        let telemetry = Arc::new(TelemetryStore::new(Arc::new(SessionNotifier::new("test"))));
        vehicle.add_camera_listener(telemetry.clone());
        PayloadReset::new(
            Arc::new(vehicle.clone()),
            telemetry,
            Arc::new(SessionConfig::default()),
        )
    }

    #[tokio::test]
    async fn test_gimbal_reset_levels_gimbal() {
        let vehicle = SimulatedVehicle::new();
        let payloads = payloads(&vehicle);

        assert!(payloads.reset_gimbal());
        tokio::task::yield_now().await;

        assert_eq!(
            vehicle.rotations(),
            vec![GimbalRotation {
                pitch: Some(-12.0),
                roll: Some(0.0),
                yaw: None,
            }]
        );
    }

    #[tokio::test]
    async fn test_camera_reset_stops_video_first() {
        let vehicle = SimulatedVehicle::new();
        let payloads = payloads(&vehicle);
        vehicle.emit_camera_system_state(
            0,
            CameraSystemState {
                mode: CameraMode::Video,
                recording: true,
                ..Default::default()
            },
        );

        assert!(payloads.reset_camera());
        tokio::task::yield_now().await;

        assert_eq!(vehicle.calls("stop_record_video"), 1);
        assert_eq!(vehicle.calls("stop_shoot_photo"), 0);
    }

    #[tokio::test]
    async fn test_idle_camera_needs_no_reset() {
        let vehicle = SimulatedVehicle::new();
        let payloads = payloads(&vehicle);
        assert!(!payloads.reset_camera());

        vehicle.emit_camera_system_state(0, CameraSystemState::default());
        assert!(!payloads.reset_camera());
    }
}
