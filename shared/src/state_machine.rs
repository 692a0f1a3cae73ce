//! Activation State Machine
//!
//! Drives a vehicle from idle to accepting direct velocity control by arming
//! the motors and taking off. The machine is pure: it reads a telemetry
//! snapshot on every call and tells the caller which hardware request to
//! issue, if any. Request failures arrive later through [`ActivationStateMachine::deactivate`].

/// Activation progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    ArmStart,
    ArmAttempting,
    ArmComplete,
    TakeoffStart,
    TakeoffAttempting,
    TakeoffComplete,
    Deactivated,
}

impl ActivationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActivationState::TakeoffComplete | ActivationState::Deactivated
        )
    }
}

/// Telemetry the machine re-evaluates on every call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActivationTelemetry {
    pub motors_running: bool,
    pub flying: bool,
    /// Flight controller is still in its transient takeoff sub-mode
    pub taking_off: bool,
}

/// Outcome of one activation call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationStep {
    /// Waiting on telemetry; call again
    Pending,
    /// Issue an arm request, then call again
    RequestArm,
    /// Issue a takeoff request, then call again
    RequestTakeoff,
    Succeeded,
    Failed,
}

impl ActivationStep {
    /// Collapse into the caller-facing tri-state: `None` while pending
    pub fn result(&self) -> Option<bool> {
        match self {
            ActivationStep::Succeeded => Some(true),
            ActivationStep::Failed => Some(false),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct ActivationStateMachine {
    state: ActivationState,
}

impl Default for ActivationStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivationStateMachine {
    /// Create a new state machine in ArmStart
    pub fn new() -> Self {
        Self {
            state: ActivationState::ArmStart,
        }
    }

    pub fn state(&self) -> ActivationState {
        self.state
    }

    /// Evaluate telemetry and advance as far as possible without waiting
    pub fn advance(&mut self, telemetry: &ActivationTelemetry) -> ActivationStep {
        use ActivationState::*;

        loop {
            match self.state {
                ArmStart => {
                    if telemetry.motors_running {
                        self.state = ArmComplete;
                        continue;
                    }
                    self.state = ArmAttempting;
                    return ActivationStep::RequestArm;
                }
                ArmAttempting => {
                    if telemetry.motors_running {
                        self.state = ArmComplete;
                        continue;
                    }
                    return ActivationStep::Pending;
                }
                ArmComplete => {
                    self.state = TakeoffStart;
                }
                TakeoffStart => {
                    if telemetry.flying {
                        self.state = TakeoffComplete;
                        continue;
                    }
                    self.state = TakeoffAttempting;
                    return ActivationStep::RequestTakeoff;
                }
                TakeoffAttempting => {
                    if telemetry.flying && !telemetry.taking_off {
                        self.state = TakeoffComplete;
                        continue;
                    }
                    return ActivationStep::Pending;
                }
                TakeoffComplete => return ActivationStep::Succeeded,
                Deactivated => return ActivationStep::Failed,
            }
        }
    }

    /// Move to Deactivated. Returns true only on the first transition, so
    /// the caller issues its safety resets exactly once.
    pub fn deactivate(&mut self) -> bool {
        if self.state == ActivationState::Deactivated {
            return false;
        }
        self.state = ActivationState::Deactivated;
        true
    }
}
