//! Operator-facing status and disengage messages

use drone_shared::{rank_messages, ControllerState, Message, MessageLevel};

/// Ranked status messages, most severe first
pub fn status_messages(controller: Option<&ControllerState>) -> Vec<Message> {
    let mut messages = match controller {
        Some(state) => state.status_messages(),
        None => vec![Message::new("Telemetry unavailable", MessageLevel::Danger)],
    };
    rank_messages(&mut messages);
    messages
}

/// Why active control is unavailable, or `None` when the session may be
/// engaged. The first matching condition wins.
pub fn disengage_reason(
    closed: bool,
    has_flight_control: bool,
    controller: Option<&ControllerState>,
) -> Option<Message> {
    if closed {
        return Some(Message::new("Vehicle disconnected", MessageLevel::Error));
    }

    if !has_flight_control {
        return Some(Message::new("Vehicle control unavailable", MessageLevel::Error));
    }

    let Some(state) = controller else {
        return Some(Message::new("Telemetry unavailable", MessageLevel::Error));
    };

    if state.reached_max_height {
        return Some(
            Message::new("Maximum altitude reached", MessageLevel::Error)
                .with_details("Descend below the altitude limit to continue"),
        );
    }

    if state.reached_max_range {
        return Some(
            Message::new("Maximum distance reached", MessageLevel::Error)
                .with_details("Fly closer to home to continue"),
        );
    }

    None
}
