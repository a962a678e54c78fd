//! Error types for the session layer.

use duelroom_protocol::{ConnectionId, Seat};

/// Errors that can occur while tracking connections.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No record exists for the given connection.
    /// Usually a late message from a connection that already went away.
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),

    /// The id counter produced an id that is already registered.
    /// This should never happen; it's reported instead of overwriting
    /// the live record.
    #[error("connection {0} is already registered")]
    DuplicateConnection(ConnectionId),

    /// The connection already holds a seat. Seats are assigned exactly
    /// once, at admission.
    #[error("connection {id} is already seated at {seat}")]
    AlreadySeated { id: ConnectionId, seat: Seat },
}
