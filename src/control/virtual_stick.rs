//! Virtual stick control session
//!
//! Drives the activation state machine with live telemetry and issues the
//! arm and takeoff requests it asks for. Callers poll [`VirtualStickSession::activate`]
//! until it returns a result. A failed request records a disengage reason and
//! deactivates the session; deactivation resets velocity and the gimbal once.

use drone_shared::state_machine::{
    ActivationState, ActivationStateMachine, ActivationStep, ActivationTelemetry,
};
use drone_shared::{
    CommandCategory, FlightMode, HardwareError, Message, MessageLevel, SessionError,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{error, info};

use super::ExecutionEngine;
use crate::hardware::{FlightControl, Vehicle};
use crate::session::payload::PayloadReset;
use crate::telemetry::TelemetryStore;

#[derive(Debug, Clone, Copy)]
enum Request {
    Arm,
    Takeoff,
}

impl Request {
    fn failure(&self, error: &HardwareError) -> (Message, SessionError) {
        match self {
            Request::Arm => (
                Message::new("Arming motors failed", MessageLevel::Error)
                    .with_details(error.to_string()),
                SessionError::ArmFailed(error.to_string()),
            ),
            Request::Takeoff => (
                Message::new("Takeoff failed", MessageLevel::Error).with_details(error.to_string()),
                SessionError::TakeoffFailed(error.to_string()),
            ),
        }
    }
}

#[derive(Default)]
struct Activation {
    machine: ActivationStateMachine,
    disengage_reason: Option<Message>,
    failure: Option<SessionError>,
}

/// State shared with in-flight arm and takeoff requests
struct Shared {
    vehicle: Arc<dyn Vehicle>,
    payloads: PayloadReset,
    activation: Mutex<Activation>,
}

impl Shared {
    fn deactivate(&self) {
        if !self.activation.lock().machine.deactivate() {
            return;
        }
        info!("[ACTIVATION] Deactivated, resetting velocity and gimbal");

        if let Some(fc) = self.vehicle.flight_control() {
            fc.send_reset_velocity();
        }
        self.payloads.reset_gimbal();
    }

    /// Deactivate without a disengage reason, keeping the first failure
    fn abort(&self, failure: SessionError) {
        self.activation.lock().failure.get_or_insert(failure);
        self.deactivate();
    }

    fn fail(&self, reason: Message, failure: SessionError) {
        {
            let mut activation = self.activation.lock();
            activation.disengage_reason = Some(reason);
            activation.failure = Some(failure);
        }
        self.deactivate();
    }
}

pub struct VirtualStickSession {
    telemetry: Arc<TelemetryStore>,
    shared: Arc<Shared>,
}

impl VirtualStickSession {
    pub fn new(
        vehicle: Arc<dyn Vehicle>,
        telemetry: Arc<TelemetryStore>,
        payloads: PayloadReset,
    ) -> Self {
        Self {
            telemetry,
            shared: Arc::new(Shared {
                vehicle,
                payloads,
                activation: Mutex::new(Activation::default()),
            }),
        }
    }

    pub fn engine(&self) -> ExecutionEngine {
        ExecutionEngine::Kernel
    }

    pub fn state(&self) -> ActivationState {
        self.shared.activation.lock().machine.state()
    }

    /// `None` while activation is in progress, then `Some(true)` once the
    /// vehicle is airborne and accepting input or `Some(false)` for good
    /// after a failure.
    pub fn activate(&self) -> Option<bool> {
        let state = self.state();
        if state.is_terminal() {
            return Some(state == ActivationState::TakeoffComplete);
        }

        let Some(fc) = self.shared.vehicle.flight_control() else {
            self.shared.abort(SessionError::DeviceUnavailable {
                category: CommandCategory::Drone,
                channel: None,
            });
            return Some(false);
        };
        let Some(controller) = self.telemetry.controller_state() else {
            self.shared.abort(SessionError::TelemetryUnavailable);
            return Some(false);
        };

        let telemetry = ActivationTelemetry {
            motors_running: controller.value.motors_running,
            flying: controller.value.flying,
            taking_off: controller.value.flight_mode == FlightMode::Takeoff,
        };
        let step = self.shared.activation.lock().machine.advance(&telemetry);

        match step {
            ActivationStep::RequestArm => {
                info!("[ACTIVATION] Arming motors");
                self.request(fc, Request::Arm);
                None
            }
            ActivationStep::RequestTakeoff => {
                info!("[ACTIVATION] Taking off");
                self.request(fc, Request::Takeoff);
                None
            }
            step => step.result(),
        }
    }

    fn request(&self, fc: Arc<dyn FlightControl>, request: Request) {
        let shared = self.shared.clone();
        tokio::spawn(async move {
            let result = match request {
                Request::Arm => fc.arm_motors().await,
                Request::Takeoff => fc.start_takeoff().await,
            };
            match result {
                Ok(()) => info!("[ACTIVATION] {:?} request accepted", request),
                Err(e) => {
                    error!("[ACTIVATION] {:?} request failed: {}", request, e);
                    let (reason, failure) = request.failure(&e);
                    shared.fail(reason, failure);
                }
            }
        });
    }

    pub fn deactivate(&self) {
        self.shared.deactivate();
    }

    pub fn disengage_reason(&self) -> Option<Message> {
        self.shared.activation.lock().disengage_reason.clone()
    }

    /// The request failure that deactivated the session, if any
    pub fn failure(&self) -> Option<SessionError> {
        self.shared.activation.lock().failure.clone()
    }
}
