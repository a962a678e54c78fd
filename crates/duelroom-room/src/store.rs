//! Room store: creates rooms, seats connections, and routes commands.
//!
//! # Concurrency note
//!
//! There is no lock around the set of rooms as a whole. Room handles live
//! in a `DashMap`, and each room's state lives inside its own actor, so
//! a command for one room never waits on another room.
//!
//! The one shared lock is the allocator's. It is held for the whole of an
//! admission (plan a seat, spawn the actor if the room is new, seat the
//! connection) and for the bookkeeping after a departure. Holding it
//! across the join round-trip means admissions are seated in the order
//! they were planned, and no two connections can ever be given the same
//! seat. Nothing under it touches the network.

use std::sync::Arc;

use dashmap::DashMap;
use duelroom_protocol::{Ability, ConnectionId, Outcome, RoomId, Seat};
use tokio::sync::Mutex;

use crate::actor::spawn_room;
use crate::{
    ActionReport, LeaveOutcome, Notifier, Room, RoomAllocator, RoomError,
    RoomHandle, RoomSettings, RoomSnapshot,
};

/// All live rooms, and the way into them.
///
/// This is the entry point for room operations from the router.
pub struct RoomStore<N: Notifier> {
    rooms: DashMap<RoomId, RoomHandle>,
    allocator: Mutex<RoomAllocator>,
    settings: RoomSettings,
    notifier: Arc<N>,
}

impl<N: Notifier> RoomStore<N> {
    pub fn new(settings: RoomSettings, notifier: Arc<N>) -> Self {
        Self {
            rooms: DashMap::new(),
            allocator: Mutex::new(RoomAllocator::new()),
            settings,
            notifier,
        }
    }

    pub fn settings(&self) -> &RoomSettings {
        &self.settings
    }

    /// Seats `connection_id` in the next available room.
    ///
    /// On success the room has already sent the connection its `role`
    /// (and told a waiting opponent that someone arrived).
    ///
    /// A planned seat can go stale: its room may have been torn down, or
    /// refilled, after the seat was queued. Such seats are discarded and
    /// the next one is tried; a freshly opened room always has room.
    ///
    /// # Errors
    /// [`RoomError::SeatingFailed`] if even a fresh room refused the
    /// connection.
    pub async fn admit(
        &self,
        connection_id: ConnectionId,
    ) -> Result<Seat, RoomError> {
        let mut allocator = self.allocator.lock().await;

        loop {
            let assignment = allocator.assign(connection_id);
            let seat = assignment.seat;

            if assignment.fresh {
                let handle =
                    spawn_room(seat.room_id, &self.settings, Arc::clone(&self.notifier));
                self.rooms.insert(seat.room_id, handle);
                tracing::info!(room_id = %seat.room_id, "room created");
            }

            let Some(handle) = self.handle(seat.room_id) else {
                tracing::debug!(%seat, "planned room is gone, trying the next seat");
                continue;
            };

            match handle.join(connection_id, seat.role).await {
                Ok(()) => return Ok(seat),
                Err(e) if assignment.fresh => {
                    self.rooms.remove(&seat.room_id);
                    allocator.withdraw(seat.room_id);
                    return Err(RoomError::SeatingFailed(format!(
                        "fresh room {} refused {connection_id}: {e}",
                        seat.room_id
                    )));
                }
                Err(e @ RoomError::SlotTaken { .. }) => {
                    tracing::error!(%seat, %connection_id, error = %e, "seat handed out twice");
                }
                Err(e) => {
                    tracing::debug!(%seat, %connection_id, error = %e, "stale seat skipped");
                }
            }
        }
    }

    /// Returns a snapshot of the room's current state.
    pub async fn get(&self, room_id: RoomId) -> Result<RoomSnapshot, RoomError> {
        self.require(room_id)?.snapshot().await
    }

    /// Runs `f` against the room inside its actor.
    ///
    /// The closure runs in the room's queue like any other command, so it
    /// sees (and leaves) the room in a consistent state relative to every
    /// other operation.
    pub async fn mutate<R, F>(&self, room_id: RoomId, f: F) -> Result<R, RoomError>
    where
        F: FnOnce(&mut Room) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.require(room_id)?.mutate(f).await
    }

    /// Starts the round on behalf of `connection_id`.
    pub async fn start(
        &self,
        room_id: RoomId,
        connection_id: ConnectionId,
    ) -> Result<(), RoomError> {
        self.require(room_id)?.start(connection_id).await
    }

    /// Ends the round with `connection_id` as the winner.
    pub async fn puzzle_solved(
        &self,
        room_id: RoomId,
        connection_id: ConnectionId,
    ) -> Result<Outcome, RoomError> {
        self.require(room_id)?.puzzle_solved(connection_id).await
    }

    /// Plays an ability for `connection_id`.
    pub async fn cast(
        &self,
        room_id: RoomId,
        connection_id: ConnectionId,
        ability: Ability,
    ) -> Result<ActionReport, RoomError> {
        self.require(room_id)?.cast(connection_id, ability).await
    }

    /// Removes `connection_id` from its room and cleans up after it.
    ///
    /// A seat vacated in a waiting room is re-offered to the next
    /// admission. When the last occupant leaves, the room is torn down
    /// and any queued seats for it are withdrawn.
    pub async fn leave(
        &self,
        room_id: RoomId,
        connection_id: ConnectionId,
    ) -> Result<LeaveOutcome, RoomError> {
        let handle = self.require(room_id)?;
        let outcome = handle.leave(connection_id).await?;

        let mut allocator = self.allocator.lock().await;
        match outcome {
            LeaveOutcome::Vacated(seat) => {
                allocator.reopen(seat);
                tracing::debug!(%seat, "seat re-offered");
            }
            LeaveOutcome::Closed => {
                self.rooms.remove(&room_id);
                let withdrawn = allocator.withdraw(room_id);
                tracing::info!(%room_id, withdrawn, "room torn down");
            }
            LeaveOutcome::Retained => {}
        }
        Ok(outcome)
    }

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Ids of all live rooms, in no particular order.
    pub fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.iter().map(|entry| *entry.key()).collect()
    }

    /// Stops every room actor and forgets every room.
    pub async fn shutdown(&self) {
        let handles: Vec<RoomHandle> =
            self.rooms.iter().map(|entry| entry.value().clone()).collect();
        self.rooms.clear();
        for handle in handles {
            // An actor that already stopped is fine.
            let _ = handle.shutdown().await;
        }
    }

    /// Clones the handle out of the map so no shard guard is held
    /// across an `.await`.
    fn handle(&self, room_id: RoomId) -> Option<RoomHandle> {
        self.rooms.get(&room_id).map(|entry| entry.value().clone())
    }

    fn require(&self, room_id: RoomId) -> Result<RoomHandle, RoomError> {
        self.handle(room_id).ok_or(RoomError::UnknownRoom(room_id))
    }
}
