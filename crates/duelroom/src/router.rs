//! Event router: turns connection events into registry, room and
//! gateway operations.
//!
//! The router is transport-agnostic. It sees three events per
//! connection (arrival, each inbound frame, departure) and never writes
//! to a socket itself; everything a client receives goes through the
//! [`BroadcastGateway`].
//!
//! | Event        | Room phase | Effect                                        |
//! |--------------|------------|-----------------------------------------------|
//! | connect      | —          | admit, seat, `role` (+ `opponentJoined`)      |
//! | `startGame`  | WAITING    | SECOND only: ACTIVE, `roundStarted`           |
//! | `puzzleSolved` | ACTIVE   | FINISHED, `roundOver winner:<sender>`         |
//! | `castAbility`| ACTIVE     | `abilityCast` (+ `roundOver` on knockout)     |
//! | disconnect   | WAITING    | seat re-offered, `lobbyNotice` to the other   |
//! | disconnect   | ACTIVE     | forfeit: `roundOver winner:<other>`           |
//! | disconnect   | last one   | room torn down                                |
//!
//! Anything that doesn't fit the table is answered with `rejected`.

use std::sync::Arc;

use duelroom_protocol::{
    ClientMessage, Codec, ConnectionId, JsonCodec, Seat, ServerMessage,
};
use duelroom_room::{Notifier, RoomSettings, RoomStore};
use duelroom_session::{ConnectionRegistry, SessionError};

use crate::DuelroomError;
use crate::gateway::{BroadcastGateway, Outbox};

/// Broadcast to every connection when the server stops.
pub const SHUTDOWN_NOTICE: &str = "server shutting down";

/// A freshly admitted connection.
#[derive(Debug)]
pub struct Admission {
    pub connection_id: ConnectionId,
    pub seat: Seat,
    /// Everything the server will ever send this connection.
    pub outbox: Outbox,
}

/// Routes connection events for the whole server.
pub struct EventRouter {
    registry: ConnectionRegistry,
    gateway: Arc<BroadcastGateway>,
    rooms: RoomStore<BroadcastGateway>,
    codec: JsonCodec,
}

impl EventRouter {
    pub fn new(settings: RoomSettings) -> Self {
        let gateway = Arc::new(BroadcastGateway::new());
        Self {
            registry: ConnectionRegistry::new(),
            rooms: RoomStore::new(settings, Arc::clone(&gateway)),
            gateway,
            codec: JsonCodec,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn gateway(&self) -> &Arc<BroadcastGateway> {
        &self.gateway
    }

    pub fn rooms(&self) -> &RoomStore<BroadcastGateway> {
        &self.rooms
    }

    /// Admits a new connection and seats it in a room.
    ///
    /// The outbox is opened before seating, so the `role` message the
    /// room sends during seating is the first thing in it.
    pub async fn connect(&self) -> Result<Admission, DuelroomError> {
        let connection_id = self.registry.admit()?;
        let outbox = self.gateway.register(connection_id);

        let seat = match self.rooms.admit(connection_id).await {
            Ok(seat) => seat,
            Err(e) => {
                self.gateway.unregister(connection_id, None);
                let _ = self.registry.remove(connection_id);
                return Err(e.into());
            }
        };
        self.registry.seat(connection_id, seat.room_id, seat.role)?;

        Ok(Admission {
            connection_id,
            seat,
            outbox,
        })
    }

    /// Applies one decoded client message.
    ///
    /// # Errors
    /// Whatever the registry or the room refused. The caller decides how
    /// to tell the client; [`dispatch`](Self::dispatch) sends `rejected`.
    pub async fn route(
        &self,
        connection_id: ConnectionId,
        msg: ClientMessage,
    ) -> Result<(), DuelroomError> {
        let seat = self
            .registry
            .seat_of(connection_id)
            .ok_or(SessionError::UnknownConnection(connection_id))?;
        let room_id = seat.room_id;

        match msg {
            ClientMessage::GetRole => {
                self.gateway.notify_player(
                    connection_id,
                    ServerMessage::Role {
                        role: seat.role,
                        room_id,
                    },
                );
            }
            ClientMessage::StartGame => {
                self.rooms.start(room_id, connection_id).await?;
            }
            ClientMessage::PuzzleSolved => {
                self.rooms.puzzle_solved(room_id, connection_id).await?;
            }
            ClientMessage::CastAbility { ability } => {
                self.rooms.cast(room_id, connection_id, ability).await?;
            }
        }
        Ok(())
    }

    /// Decodes one inbound frame and routes it. Never fails: problems
    /// are reported to the sender as a `rejected` notice and the
    /// connection stays open.
    pub async fn dispatch(&self, connection_id: ConnectionId, frame: &[u8]) {
        let msg: ClientMessage = match self.codec.decode(frame) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(%connection_id, error = %e, "undecodable frame");
                self.reject(connection_id, 400, format!("invalid message: {e}"));
                return;
            }
        };

        let kind = msg.kind();
        if let Err(e) = self.route(connection_id, msg).await {
            tracing::debug!(%connection_id, kind, error = %e, "message rejected");
            self.reject(connection_id, e.code(), e.to_string());
        }
    }

    /// Cleans up after a connection that went away.
    ///
    /// Safe to call more than once; only the first call does anything.
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let record = match self.registry.remove(connection_id) {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!(%connection_id, error = %e, "disconnect ignored");
                return;
            }
        };

        if let Some(seat) = record.seat {
            match self.rooms.leave(seat.room_id, connection_id).await {
                Ok(outcome) => {
                    tracing::info!(%connection_id, %seat, ?outcome, "player disconnected");
                }
                Err(e) => {
                    tracing::debug!(%connection_id, %seat, error = %e, "leave failed");
                }
            }
        }
        self.gateway
            .unregister(connection_id, record.seat.map(|seat| seat.room_id));
    }

    /// Tells everyone the server is going away and stops every room.
    pub async fn shutdown(&self) {
        tracing::info!(
            connections = self.registry.len(),
            rooms = self.rooms.room_count(),
            "shutting down"
        );
        self.gateway.notify_all(ServerMessage::LobbyNotice {
            message: SHUTDOWN_NOTICE.into(),
        });
        self.rooms.shutdown().await;
    }

    fn reject(&self, connection_id: ConnectionId, code: u16, reason: String) {
        self.gateway
            .notify_player(connection_id, ServerMessage::Rejected { code, reason });
    }
}
