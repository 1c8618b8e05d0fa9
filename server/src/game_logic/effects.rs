use std::time::Duration;
use uuid::Uuid;

use super::messages::ServerToClientMessage;

/// Side effects produced by a state transition, executed by the room manager.
///
/// Room broadcasts are resolved against the room's membership when the effect
/// runs, so a room torn down in the same transition simply receives nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Send {
        to: Uuid,
        message: ServerToClientMessage,
    },
    Broadcast {
        room: String,
        message: ServerToClientMessage,
    },
    ScheduleMeetingTimeout {
        room: String,
        meeting: u64,
        after: Duration,
    },
    CancelMeetingTimeout {
        room: String,
    },
    /// Pause periodic snapshots for the room, then push one when `after` elapses.
    ScheduleResume {
        room: String,
        meeting: u64,
        after: Duration,
    },
}

impl Effect {
    pub fn send(to: Uuid, message: ServerToClientMessage) -> Self {
        Effect::Send { to, message }
    }

    pub fn broadcast(room: &str, message: ServerToClientMessage) -> Self {
        Effect::Broadcast {
            room: room.to_string(),
            message,
        }
    }
}
