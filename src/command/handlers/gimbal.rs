//! Gimbal command handler

use drone_shared::{
    CommandCategory, GimbalCommand, GimbalCommandKind, GimbalMode, GimbalOrientation, SessionError,
};
use futures::FutureExt;

use super::{conditionally, HandlerContext};
use crate::command::queue::CommandFuture;
use crate::hardware::GimbalRotation;

/// Straight-down pitch is rejected by the gimbal
const NADIR_PITCH_DEG: f64 = -89.9;

pub fn execute(ctx: &HandlerContext, command: &GimbalCommand) -> Result<CommandFuture, SessionError> {
    let unavailable = SessionError::DeviceUnavailable {
        category: CommandCategory::Gimbal,
        channel: Some(command.channel),
    };
    let gimbal = ctx.vehicle.gimbal(command.channel).ok_or(unavailable.clone())?;
    let state = ctx
        .telemetry
        .gimbal_state(command.channel)
        .ok_or(unavailable)?
        .value;

    match command.kind {
        GimbalCommandKind::Mode(mode) => {
            let current = state.mode;
            Ok(async move { conditionally(mode != current, || gimbal.set_mode(mode)).await }.boxed())
        }
        GimbalCommandKind::Orientation(orientation) => {
            let rotation = rotation(orientation, state.mode);
            Ok(async move {
                match rotation {
                    Some(rotation) => gimbal.rotate(rotation).await.map_err(SessionError::from),
                    None => Ok(()),
                }
            }
            .boxed())
        }
        GimbalCommandKind::YawSimultaneousFollow(_) => Err(SessionError::CommandTypeUnhandled(
            "gimbal yaw simultaneous follow",
        )),
    }
}

/// Convert a target orientation in radians to a rotation in degrees.
///
/// Roll and yaw are only applied in free mode. Returns `None` when nothing
/// applicable is left to send.
pub(crate) fn rotation(orientation: GimbalOrientation, mode: GimbalMode) -> Option<GimbalRotation> {
    let pitch = orientation.pitch.map(f64::to_degrees).map(|pitch| {
        if (pitch + 90.0).abs() < 0.1 {
            NADIR_PITCH_DEG
        } else {
            pitch
        }
    });

    let free = mode == GimbalMode::Free;
    let roll = orientation.roll.map(f64::to_degrees).filter(|_| free);
    let yaw = orientation.yaw.map(f64::to_degrees).filter(|_| free);

    if pitch.is_none() && roll.is_none() && yaw.is_none() {
        return None;
    }
    Some(GimbalRotation { pitch, roll, yaw })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_straight_down_pitch_is_clamped() {
        let rotation = rotation(
            GimbalOrientation {
                pitch: Some(-FRAC_PI_2),
                ..Default::default()
            },
            GimbalMode::YawFollow,
        )
        .unwrap();
        assert_eq!(rotation.pitch, Some(NADIR_PITCH_DEG));
    }

    #[test]
    fn test_roll_and_yaw_only_in_free_mode() {
        let orientation = GimbalOrientation {
            pitch: Some(-0.5),
            roll: Some(0.1),
            yaw: Some(1.0),
        };

        let follow = rotation(orientation, GimbalMode::YawFollow).unwrap();
        assert!(follow.roll.is_none());
        assert!(follow.yaw.is_none());
        assert!((follow.pitch.unwrap() - (-0.5f64).to_degrees()).abs() < 1e-9);

        let free = rotation(orientation, GimbalMode::Free).unwrap();
        assert!((free.yaw.unwrap() - 1.0f64.to_degrees()).abs() < 1e-9);
    }

    #[test]
    fn test_nothing_applicable() {
        assert!(rotation(GimbalOrientation::default(), GimbalMode::Free).is_none());

        let yaw_only = GimbalOrientation {
            yaw: Some(1.0),
            ..Default::default()
        };
        assert!(rotation(yaw_only, GimbalMode::YawFollow).is_none());
    }
}
