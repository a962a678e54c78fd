//! The outbound seam between rooms and connections.

use duelroom_protocol::{ConnectionId, RoomId, ServerMessage};

/// Delivers server messages on behalf of room actors.
///
/// The room crate never touches a socket. Actors call these methods and
/// the implementation (the server's broadcast gateway, or a recorder in
/// tests) decides how messages reach clients.
///
/// All methods are synchronous and must not block: they are called from
/// inside a room actor, and a slow client must never stall a room.
/// Messages to unknown or closed connections are dropped silently.
pub trait Notifier: Send + Sync + 'static {
    /// Adds `connection_id` to the broadcast group of `room_id`.
    fn subscribe(&self, room_id: RoomId, connection_id: ConnectionId);

    /// Removes `connection_id` from the broadcast group of `room_id`.
    fn unsubscribe(&self, room_id: RoomId, connection_id: ConnectionId);

    /// Sends `msg` to every current member of the room's group.
    fn notify_room(&self, room_id: RoomId, msg: ServerMessage);

    /// Sends `msg` to one connection.
    fn notify_player(&self, connection_id: ConnectionId, msg: ServerMessage);
}
