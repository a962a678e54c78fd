//! Room allocation and lifecycle for Duelroom.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns the
//! room's state and its round timer. Rooms never share a lock with each
//! other.
//!
//! # Key types
//!
//! - [`RoomStore`] — seats connections, routes commands, tears rooms down
//! - [`RoomAllocator`] — decides which room and role a connection gets
//! - [`Room`] — the two-seat state machine (phases, abilities, outcome)
//! - [`RoomHandle`] — send commands to a running room actor
//! - [`Notifier`] — how rooms reach clients
//! - [`RoomSettings`] — round length, starting health, hand

mod actor;
mod allocator;
mod config;
mod error;
mod notify;
mod room;
mod store;

pub use actor::{LeaveOutcome, RoomHandle};
pub use allocator::{Assignment, RoomAllocator};
pub use config::{Phase, RoomSettings};
pub use error::RoomError;
pub use notify::Notifier;
pub use room::{ABILITY_POWER, ActionReport, PlayerRecord, Room, RoomSnapshot};
pub use store::RoomStore;
