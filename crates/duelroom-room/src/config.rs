//! Room settings and the phase state machine.

use std::time::Duration;

use duelroom_protocol::Ability;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomSettings
// ---------------------------------------------------------------------------

/// Settings shared by every room the store creates.
///
/// The server builds one of these from its configuration file and hands
/// it to [`RoomStore::new`](crate::RoomStore::new); each room actor gets
/// its own copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSettings {
    /// How long a round lasts once SECOND starts it.
    pub round_duration: Duration,

    /// Health each player starts the round with. Healing never goes
    /// above it.
    pub starting_health: u32,

    /// The abilities every player holds.
    pub hand: Vec<Ability>,

    /// Capacity of each room actor's command queue. When it fills up,
    /// senders wait (backpressure) instead of growing memory.
    pub channel_size: usize,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            round_duration: Duration::from_secs(60),
            starting_health: 1000,
            hand: vec![Ability::Fireball, Ability::Holylight],
            channel_size: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// The lifecycle phase of a room.
///
/// Transitions are strictly ordered, no skipping and no going back:
///
/// ```text
/// Waiting → Active → Finished
/// ```
///
/// - **Waiting**: the room has zero, one or two occupants and the round
///   hasn't started. Seats may still be filled.
/// - **Active**: SECOND started the round. The deadline is running and
///   abilities may be cast.
/// - **Finished**: the round has an outcome. Nothing changes any more;
///   the room only waits for its occupants to leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Waiting,
    Active,
    Finished,
}

impl Phase {
    /// The only phase this one may move to, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Waiting => Some(Self::Active),
            Self::Active => Some(Self::Finished),
            Self::Finished => None,
        }
    }

    /// Returns `true` if moving to `target` is a legal single step.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "WAITING"),
            Self::Active => write!(f, "ACTIVE"),
            Self::Finished => write!(f, "FINISHED"),
        }
    }
}
