//! Remote controller command handler

use drone_shared::{CommandCategory, RemoteControllerCommand, RemoteControllerCommandKind, SessionError};

use super::HandlerContext;
use crate::command::queue::CommandFuture;

pub fn execute(
    ctx: &HandlerContext,
    command: &RemoteControllerCommand,
) -> Result<CommandFuture, SessionError> {
    if !ctx.vehicle.has_remote_controller(command.channel) {
        return Err(SessionError::DeviceUnavailable {
            category: CommandCategory::RemoteController,
            channel: Some(command.channel),
        });
    }

    // No remote controller setting has a vehicle mapping yet
    match command.kind {
        RemoteControllerCommandKind::TargetGimbalChannel(_) => {
            Err(SessionError::CommandTypeUnhandled("target gimbal channel"))
        }
    }
}
