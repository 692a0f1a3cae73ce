//! Session coordinator loop
//!
//! One task ticks at a fixed interval until the session closes. Each tick
//! publishes the one-shot initialized and located notifications, snapshots
//! the last ground location, refreshes polled telemetry and gives every
//! command queue one scheduling slot.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use super::delegate::SessionNotifier;
use super::state::SessionState;
use crate::command::CommandExecutor;
use crate::config::SessionConfig;
use crate::hardware::Vehicle;
use crate::telemetry::TelemetryStore;

pub struct Coordinator {
    vehicle: Arc<dyn Vehicle>,
    state: Arc<SessionState>,
    telemetry: Arc<TelemetryStore>,
    executor: Arc<CommandExecutor>,
    notifier: Arc<SessionNotifier>,
    config: Arc<SessionConfig>,
}

impl Coordinator {
    pub fn new(
        vehicle: Arc<dyn Vehicle>,
        state: Arc<SessionState>,
        telemetry: Arc<TelemetryStore>,
        executor: Arc<CommandExecutor>,
        notifier: Arc<SessionNotifier>,
        config: Arc<SessionConfig>,
    ) -> Self {
        Self {
            vehicle,
            state,
            telemetry,
            executor,
            notifier,
            config,
        }
    }

    /// Spawn the loop onto the runtime
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        let mut ticker = interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "[SESSION] Coordinator started ({}ms tick)",
            self.config.tick_interval.as_millis()
        );

        loop {
            ticker.tick().await;
            if self.state.is_closed() {
                break;
            }
            self.tick();
        }

        // Queued commands are abandoned without callbacks
        self.executor.close();
        info!("[SESSION] Coordinator stopped");
    }

    /// One pass of the loop
    pub fn tick(&self) {
        if !self.state.is_initialized()
            && self.state.details_known()
            && self.notifier.initialized_once(|| self.state.mark_initialized())
        {
            info!("[SESSION] Initialized");
        }

        if let Some(controller) = self.telemetry.controller_state() {
            if let Some(location) = controller.value.location() {
                if self.notifier.located_once(|| self.state.mark_located()) {
                    info!(
                        "[SESSION] Located at {:.6}, {:.6}",
                        location.latitude, location.longitude
                    );
                }

                if !controller.value.flying {
                    self.state.set_last_ground_location(location);
                }
            }
        }

        self.refresh_polled_telemetry();
        self.executor.process_all();
    }

    /// Exposure and focus mode are not pushed by the camera. A stale value
    /// is restamped before the request goes out, so at most one read per
    /// field is outstanding.
    fn refresh_polled_telemetry(&self) {
        let threshold = self.config.telemetry_refresh;

        for channel in self.vehicle.camera_channels() {
            let Some(camera) = self.vehicle.camera(channel) else {
                continue;
            };

            if self.telemetry.claim_exposure_mode_refresh(channel, threshold) {
                let camera = camera.clone();
                let telemetry = self.telemetry.clone();
                tokio::spawn(async move {
                    match camera.exposure_mode().await {
                        Ok(mode) => telemetry.write_exposure_mode(channel, mode),
                        Err(e) => debug!("[CAMERA] Exposure mode refresh failed: {}", e),
                    }
                });
            }

            if self.telemetry.claim_focus_mode_refresh(channel, threshold) {
                let telemetry = self.telemetry.clone();
                tokio::spawn(async move {
                    match camera.focus_mode().await {
                        Ok(mode) => telemetry.write_focus_mode(channel, mode),
                        Err(e) => debug!("[CAMERA] Focus mode refresh failed: {}", e),
                    }
                });
            }
        }
    }
}
