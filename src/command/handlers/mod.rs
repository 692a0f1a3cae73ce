//! Command handlers for each device category
//!
//! A handler resolves the target device, then returns the future for one
//! attempt. Errors returned before the future exists mean the command
//! cannot run at all.

mod camera;
mod drone;
mod gimbal;
mod remote_controller;

use drone_shared::{KernelCommand, SessionError};
use std::future::Future;
use std::sync::Arc;

use super::queue::{CommandFuture, CommandResult};
use crate::config::SessionConfig;
use crate::hardware::{HardwareResult, Vehicle};
use crate::telemetry::TelemetryStore;

/// Context passed to command handlers
#[derive(Clone)]
pub struct HandlerContext {
    pub vehicle: Arc<dyn Vehicle>,
    pub telemetry: Arc<TelemetryStore>,
    pub config: Arc<SessionConfig>,
}

/// Start one attempt of `command`
pub fn execute(ctx: &HandlerContext, command: &KernelCommand) -> Result<CommandFuture, SessionError> {
    match command {
        KernelCommand::Drone(c) => drone::execute(ctx, *c),
        KernelCommand::RemoteController(c) => remote_controller::execute(ctx, c),
        KernelCommand::Camera(c) => camera::execute(ctx, c),
        KernelCommand::Gimbal(c) => gimbal::execute(ctx, c),
    }
}

/// Run `request` only when the target differs from the current value
async fn conditionally<F, Fut>(should_execute: bool, request: F) -> CommandResult
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = HardwareResult<()>>,
{
    if !should_execute {
        return Ok(());
    }
    request().await.map_err(SessionError::from)
}
