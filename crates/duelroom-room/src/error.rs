//! Error types for the room layer.

use duelroom_protocol::{ConnectionId, Role, RoomId};

use crate::Phase;

/// Errors that can occur during room operations.
///
/// Every variant is local to one room: a failing operation never affects
/// any other room.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist (never did, or was already torn down).
    #[error("room {0} not found")]
    UnknownRoom(RoomId),

    /// The connection is not an occupant of this room.
    #[error("connection {connection_id} is not in room {room_id}")]
    UnknownConnection {
        connection_id: ConnectionId,
        room_id: RoomId,
    },

    /// The seat the allocator planned is already occupied.
    /// The allocator lock should make this impossible; admission treats
    /// it as a stale seat and retries.
    #[error("seat {role} in room {room_id} is already taken")]
    SlotTaken { room_id: RoomId, role: Role },

    /// The requested phase change is not a single legal step.
    /// The room's state is unchanged.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: Phase, to: Phase },

    /// The operation needs an active round.
    #[error("round is not active (room is {0})")]
    RoundNotActive(Phase),

    /// The sender's role (or the room's occupancy) doesn't allow this.
    #[error("not permitted: {0}")]
    NotPermitted(String),

    /// The room's command channel is full or closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),

    /// Admission could not place the connection in any room.
    #[error("seating failed: {0}")]
    SeatingFailed(String),
}

impl RoomError {
    /// The HTTP-style code sent to the client in a `rejected` notice.
    pub fn code(&self) -> u16 {
        match self {
            Self::UnknownRoom(_) | Self::UnknownConnection { .. } => 404,
            Self::SlotTaken { .. }
            | Self::InvalidTransition { .. }
            | Self::RoundNotActive(_) => 409,
            Self::NotPermitted(_) => 403,
            Self::Unavailable(_) | Self::SeatingFailed(_) => 503,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_maps_error_classes() {
        let transition = RoomError::InvalidTransition {
            from: Phase::Finished,
            to: Phase::Active,
        };
        assert_eq!(transition.code(), 409);
        assert_eq!(RoomError::NotPermitted("x".into()).code(), 403);
        assert_eq!(RoomError::UnknownRoom(RoomId(1)).code(), 404);
        assert_eq!(RoomError::Unavailable(RoomId(1)).code(), 503);
    }

    #[test]
    fn test_invalid_transition_message_names_phases() {
        let err = RoomError::InvalidTransition {
            from: Phase::Finished,
            to: Phase::Active,
        };
        assert_eq!(err.to_string(), "invalid transition from FINISHED to ACTIVE");
    }
}
