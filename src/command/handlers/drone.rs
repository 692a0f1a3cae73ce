//! Vehicle-wide command handler

use drone_shared::{CommandCategory, DroneCommand, SessionError};
use futures::FutureExt;

use super::HandlerContext;
use crate::command::queue::CommandFuture;

pub fn execute(ctx: &HandlerContext, command: DroneCommand) -> Result<CommandFuture, SessionError> {
    let fc = ctx
        .vehicle
        .flight_control()
        .ok_or(SessionError::DeviceUnavailable {
            category: CommandCategory::Drone,
            channel: None,
        })?;

    let request = match command {
        DroneCommand::Takeoff => async move { fc.start_takeoff().await }.boxed(),
        DroneCommand::StartReturnHome => async move { fc.start_return_home().await }.boxed(),
        DroneCommand::StopReturnHome => async move { fc.cancel_return_home().await }.boxed(),
        DroneCommand::StartLanding => async move { fc.start_landing().await }.boxed(),
        DroneCommand::StopLanding => async move { fc.cancel_landing().await }.boxed(),
        DroneCommand::StartCompassCalibration => {
            async move { fc.start_compass_calibration().await }.boxed()
        }
        DroneCommand::StopCompassCalibration => {
            return Err(SessionError::CapabilityUnsupported(
                "stop compass calibration".into(),
            ))
        }
    };

    Ok(async move { request.await.map_err(SessionError::from) }.boxed())
}
