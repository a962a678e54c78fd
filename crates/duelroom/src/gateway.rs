//! Broadcast gateway: the only road from the server to its clients.
//!
//! Every connection gets an *outbox*, an unbounded queue of
//! [`ServerMessage`]s. Room actors, the router and shutdown all push into
//! outboxes; one pump task per connection drains its outbox, wraps each
//! message in an [`Envelope`] and writes it to the socket. So:
//!
//! - a slow client never blocks a room (pushing never waits), and
//! - each client sees messages in exactly the order they were issued,
//!   numbered by a per-connection `seq`.
//!
//! ```text
//!  room actor ─┐
//!  router ─────┼─→ outbox (conn-7) ─→ Outbox::next() ─→ pump ─→ socket
//!  shutdown ───┘
//! ```

use std::collections::HashSet;
use std::time::Instant;

use dashmap::DashMap;
use duelroom_protocol::{ConnectionId, Envelope, RoomId, ServerMessage};
use duelroom_room::Notifier;
use tokio::sync::mpsc;

/// Fan-out of server messages to connections and room groups.
#[derive(Debug)]
pub struct BroadcastGateway {
    outboxes: DashMap<ConnectionId, mpsc::UnboundedSender<ServerMessage>>,
    groups: DashMap<RoomId, HashSet<ConnectionId>>,
    /// Envelope timestamps are milliseconds since this instant.
    started: Instant,
}

impl Default for BroadcastGateway {
    fn default() -> Self {
        Self {
            outboxes: DashMap::new(),
            groups: DashMap::new(),
            started: Instant::now(),
        }
    }
}

impl BroadcastGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens an outbox for `connection_id` and returns its receiving end.
    ///
    /// Registering the same id twice replaces the old outbox; the old
    /// receiver sees the end of its stream.
    pub fn register(&self, connection_id: ConnectionId) -> Outbox {
        let (tx, rx) = mpsc::unbounded_channel();
        self.outboxes.insert(connection_id, tx);
        Outbox {
            connection_id,
            receiver: rx,
            next_seq: 0,
            started: self.started,
        }
    }

    /// Closes the outbox of `connection_id`, and drops it from the group
    /// of `room_id` if it was seated there.
    ///
    /// Only that one group is touched. A connection is in at most one
    /// room, and the room actor normally unsubscribes it on leave; this
    /// covers a room that stopped before it could.
    ///
    /// Messages already queued are still delivered; the pump stops once it
    /// has drained them.
    pub fn unregister(&self, connection_id: ConnectionId, room_id: Option<RoomId>) {
        self.outboxes.remove(&connection_id);
        if let Some(room_id) = room_id {
            self.unsubscribe(room_id, connection_id);
        }
    }

    /// Sends `msg` to every registered connection (a lobby-wide notice).
    pub fn notify_all(&self, msg: ServerMessage) {
        for outbox in self.outboxes.iter() {
            let _ = outbox.value().send(msg.clone());
        }
    }

    /// Number of open outboxes.
    pub fn connection_count(&self) -> usize {
        self.outboxes.len()
    }

    /// Number of connections subscribed to `room_id`.
    pub fn group_size(&self, room_id: RoomId) -> usize {
        self.groups.get(&room_id).map_or(0, |members| members.len())
    }

    fn send(&self, connection_id: ConnectionId, msg: ServerMessage) {
        match self.outboxes.get(&connection_id) {
            Some(outbox) => {
                if outbox.send(msg).is_err() {
                    tracing::trace!(%connection_id, "outbox closed, message dropped");
                }
            }
            None => {
                tracing::trace!(%connection_id, kind = msg.kind(), "no outbox, message dropped");
            }
        }
    }
}

impl Notifier for BroadcastGateway {
    fn subscribe(&self, room_id: RoomId, connection_id: ConnectionId) {
        self.groups.entry(room_id).or_default().insert(connection_id);
    }

    fn unsubscribe(&self, room_id: RoomId, connection_id: ConnectionId) {
        // remove_if keeps an empty group from lingering.
        if let Some(mut members) = self.groups.get_mut(&room_id) {
            members.remove(&connection_id);
        }
        self.groups.remove_if(&room_id, |_, members| members.is_empty());
    }

    fn notify_room(&self, room_id: RoomId, msg: ServerMessage) {
        // Copy the member list out so no shard guard is held while
        // touching the outbox map.
        let members: Vec<ConnectionId> = match self.groups.get(&room_id) {
            Some(members) => members.iter().copied().collect(),
            None => return,
        };
        for member in members {
            self.send(member, msg.clone());
        }
    }

    fn notify_player(&self, connection_id: ConnectionId, msg: ServerMessage) {
        self.send(connection_id, msg);
    }
}

/// The receiving end of one connection's outbox.
///
/// Owned by the connection's pump task. [`next`](Self::next) stamps each
/// message with the connection's next sequence number.
#[derive(Debug)]
pub struct Outbox {
    connection_id: ConnectionId,
    receiver: mpsc::UnboundedReceiver<ServerMessage>,
    next_seq: u64,
    started: Instant,
}

impl Outbox {
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Waits for the next message, wrapped and numbered.
    /// Returns `None` once the outbox is unregistered and drained.
    pub async fn next(&mut self) -> Option<Envelope<ServerMessage>> {
        let payload = self.receiver.recv().await?;
        Some(self.wrap(payload))
    }

    /// Like [`next`](Self::next), but returns `None` instead of waiting
    /// when nothing is queued.
    pub fn try_next(&mut self) -> Option<Envelope<ServerMessage>> {
        let payload = self.receiver.try_recv().ok()?;
        Some(self.wrap(payload))
    }

    fn wrap(&mut self, payload: ServerMessage) -> Envelope<ServerMessage> {
        let seq = self.next_seq;
        self.next_seq += 1;
        Envelope {
            seq,
            timestamp: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
            payload,
        }
    }
}
