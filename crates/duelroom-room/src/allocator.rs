//! Seat planning: which room and role the next connection gets.
//!
//! The allocator is pure bookkeeping. It never talks to a room; it only
//! decides where a connection *should* sit. [`RoomStore`](crate::RoomStore)
//! owns it behind a mutex and is responsible for making the plan real.

use std::collections::VecDeque;

use duelroom_protocol::{ConnectionId, Role, RoomId, Seat};

/// A planned seat, as returned by [`RoomAllocator::assign`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub seat: Seat,
    /// `true` if the room was created by this assignment and has no
    /// actor yet.
    pub fresh: bool,
}

/// Deterministic pairing of connections into rooms.
///
/// ```text
/// assign(c1) → R-1 FIRST  (fresh)   open: [R-1/SECOND]
/// assign(c2) → R-1 SECOND           open: []
/// assign(c3) → R-2 FIRST  (fresh)   open: [R-2/SECOND]
/// ```
///
/// Seats vacated in a waiting room are [`reopen`](Self::reopen)ed at the
/// front of the queue, so a half-empty room is refilled before a new one
/// is opened.
#[derive(Debug)]
pub struct RoomAllocator {
    open: VecDeque<Seat>,
    next_room: u64,
}

impl Default for RoomAllocator {
    fn default() -> Self {
        Self {
            open: VecDeque::new(),
            next_room: 1,
        }
    }
}

impl RoomAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plans a seat for `connection_id`.
    ///
    /// Takes the oldest open seat if there is one; otherwise opens a new
    /// room, gives out its FIRST seat and queues its SECOND seat.
    pub fn assign(&mut self, connection_id: ConnectionId) -> Assignment {
        if let Some(seat) = self.open.pop_front() {
            tracing::debug!(%connection_id, %seat, "assigned open seat");
            return Assignment { seat, fresh: false };
        }

        let room_id = RoomId(self.next_room);
        self.next_room += 1;
        self.open.push_back(Seat {
            room_id,
            role: Role::Second,
        });
        tracing::debug!(%connection_id, %room_id, "opened new room");
        Assignment {
            seat: Seat {
                room_id,
                role: Role::First,
            },
            fresh: true,
        }
    }

    /// Offers `seat` again, ahead of every other open seat.
    pub fn reopen(&mut self, seat: Seat) {
        if self.open.contains(&seat) {
            return;
        }
        self.open.push_front(seat);
    }

    /// Drops every open seat of `room_id` (the room is gone).
    /// Returns how many seats were dropped.
    pub fn withdraw(&mut self, room_id: RoomId) -> usize {
        let before = self.open.len();
        self.open.retain(|seat| seat.room_id != room_id);
        before - self.open.len()
    }

    /// Number of seats waiting to be filled.
    pub fn open_seats(&self) -> usize {
        self.open.len()
    }

    /// Number of rooms opened so far.
    pub fn rooms_opened(&self) -> u64 {
        self.next_room - 1
    }
}
