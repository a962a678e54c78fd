//! Unified error type for the Duelroom server.

use duelroom_protocol::ProtocolError;
use duelroom_room::RoomError;
use duelroom_session::SessionError;
use duelroom_transport::TransportError;

use crate::config::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum DuelroomError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A connection-registry error (unknown or duplicate connection).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (bad transition, not permitted, unknown room).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl DuelroomError {
    /// The code sent to a client in a `rejected` notice when this error
    /// was caused by one of its messages.
    pub fn code(&self) -> u16 {
        match self {
            Self::Room(e) => e.code(),
            Self::Session(SessionError::UnknownConnection(_)) => 404,
            Self::Session(_) => 409,
            Self::Protocol(_) => 400,
            Self::Transport(_) | Self::Config(_) => 500,
        }
    }
}
