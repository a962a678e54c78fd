//! The per-connection record kept by the registry.

use std::time::{Duration, Instant};

use duelroom_protocol::{ConnectionId, Seat};

/// What the server knows about one live connection.
///
/// Rooms only ever hold the [`ConnectionId`]; the record itself is owned
/// by the [`ConnectionRegistry`](crate::ConnectionRegistry).
#[derive(Debug, Clone)]
pub struct ConnectionRecord {
    pub connection_id: ConnectionId,

    /// The room and role this connection was placed in.
    /// `None` only in the short window between admission and seating.
    pub seat: Option<Seat>,

    /// When the connection was admitted. Only used for logging.
    pub admitted_at: Instant,
}

impl ConnectionRecord {
    pub(crate) fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            seat: None,
            admitted_at: Instant::now(),
        }
    }

    /// How long this connection has been around.
    pub fn age(&self) -> Duration {
        self.admitted_at.elapsed()
    }
}
