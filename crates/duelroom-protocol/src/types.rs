//! Core protocol types for Duelroom's wire format.
//!
//! Everything in this module travels "on the wire": it gets serialized to
//! JSON, sent over the WebSocket, and parsed by the browser client (or the
//! other way around). The JSON shapes are part of the public contract, so
//! the tests at the bottom pin them down exactly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Transient identity of one live connection.
///
/// Handed out by the connection registry on admission and never reused
/// for the lifetime of the process. It is the only identity a player has:
/// there are no accounts and no reconnection.
///
/// `#[serde(transparent)]` makes `ConnectionId(42)` serialize as plain
/// `42` rather than `{ "0": 42 }`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A unique identifier for a room (one two-player duel).
///
/// Assigned from a monotonic counter by the room allocator; a room id is
/// never reused, even after the room has been torn down.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Role and Seat
// ---------------------------------------------------------------------------

/// Which side of the room a player occupies.
///
/// The role is fixed at admission. It decides the permission asymmetry of
/// the protocol: only [`Role::Second`] may start the round.
///
/// On the wire roles are `"FIRST"` and `"SECOND"`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// The player who opened the room.
    First,
    /// The player who completed the pair.
    Second,
}

impl Role {
    /// Both roles in slot order.
    pub const ALL: [Role; 2] = [Role::First, Role::Second];

    /// Slot index inside a room: 0 for FIRST, 1 for SECOND.
    pub fn index(self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
        }
    }

    /// The other role in the same room.
    pub fn opponent(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => write!(f, "FIRST"),
            Self::Second => write!(f, "SECOND"),
        }
    }
}

impl FromStr for Role {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FIRST" => Ok(Self::First),
            "SECOND" => Ok(Self::Second),
            other => Err(ProtocolError::InvalidMessage(format!(
                "unknown role {other:?}"
            ))),
        }
    }
}

/// A place in a specific room: the unit the allocator hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Seat {
    pub room_id: RoomId,
    pub role: Role,
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.room_id, self.role)
    }
}

// ---------------------------------------------------------------------------
// Abilities
// ---------------------------------------------------------------------------

/// An ability card a player holds in their hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ability {
    /// Damages the opponent.
    Fireball,
    /// Heals the caster.
    Holylight,
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fireball => write!(f, "fireball"),
            Self::Holylight => write!(f, "holylight"),
        }
    }
}

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Messages a client may send.
///
/// Internally tagged: `{ "type": "startGame" }`. Anything else the client
/// sends is rejected with a `rejected` notice and the connection stays open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// "Which role am I?" The server answers with [`ServerMessage::Role`].
    ///
    /// Older clients send `getPlayerNumber`; it means the same thing.
    #[serde(alias = "getPlayerNumber")]
    GetRole,

    /// "Start the round." Only valid from the SECOND occupant of a full
    /// room that is still waiting.
    StartGame,

    /// "I solved the puzzle." Ends an active round with the sender as
    /// the winner. Completion is trusted, not verified.
    PuzzleSolved,

    /// "Play this card." Valid once per turn while the round is active.
    CastAbility { ability: Ability },
}

impl ClientMessage {
    /// Short name used in logs and rejection notices.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::GetRole => "getRole",
            Self::StartGame => "startGame",
            Self::PuzzleSolved => "puzzleSolved",
            Self::CastAbility { .. } => "castAbility",
        }
    }
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// How a round ended.
///
/// Serialized as a single string: `"winner:FIRST"`, `"winner:SECOND"` or
/// `"timeout"`. That's the format the client matches on, so the enum goes
/// through `String` on the wire instead of serde's default tagging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Outcome {
    /// The given role won.
    Winner(Role),
    /// The round deadline passed with no winner.
    Timeout,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Winner(role) => write!(f, "winner:{role}"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

impl FromStr for Outcome {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "timeout" {
            return Ok(Self::Timeout);
        }
        match s.strip_prefix("winner:") {
            Some(role) => Ok(Self::Winner(role.parse()?)),
            None => Err(ProtocolError::InvalidMessage(format!(
                "unknown outcome {s:?}"
            ))),
        }
    }
}

impl From<Outcome> for String {
    fn from(outcome: Outcome) -> Self {
        outcome.to_string()
    }
}

impl TryFrom<String> for Outcome {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Why a round ended. Informational; the outcome is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EndReason {
    /// A player reported solving the puzzle.
    PuzzleSolved,
    /// The round timer expired.
    Timeout,
    /// The opponent disconnected mid-round.
    Forfeit,
    /// The opponent's health reached zero.
    Knockout,
}

/// Both players' health after an ability resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub first: u32,
    pub second: u32,
}

/// Messages the server sends. Every one of them goes out through the
/// broadcast gateway wrapped in an [`Envelope`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    /// Unicast: the receiver's role (sent on admission and on `getRole`).
    Role { role: Role, room_id: RoomId },

    /// Unicast to the waiting occupant when the second player arrives.
    OpponentJoined { message: String },

    /// Room broadcast: the round is live and lasts `duration_secs`.
    RoundStarted { duration_secs: u64 },

    /// Room broadcast: the round is over. Sent exactly once per room.
    RoundOver { outcome: Outcome, reason: EndReason },

    /// Informational text, never authoritative.
    LobbyNotice { message: String },

    /// Room broadcast: an ability was played.
    AbilityCast {
        role: Role,
        ability: Ability,
        health: HealthReport,
    },

    /// Unicast: the client's last message was refused. `code` follows
    /// HTTP conventions (400 bad request, 403 forbidden, 404 unknown,
    /// 409 conflicting state).
    Rejected { code: u16, reason: String },
}

impl ServerMessage {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Role { .. } => "role",
            Self::OpponentJoined { .. } => "opponentJoined",
            Self::RoundStarted { .. } => "roundStarted",
            Self::RoundOver { .. } => "roundOver",
            Self::LobbyNotice { .. } => "lobbyNotice",
            Self::AbilityCast { .. } => "abilityCast",
            Self::Rejected { .. } => "rejected",
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The outbound frame wrapper.
///
/// ```text
/// ┌──────────────────────────────┐
/// │ seq: 3                       │  ← per-connection, starts at 0
/// │ timestamp: 1500              │  ← ms since server start
/// │ ┌──────────────────────────┐ │
/// │ │ payload: roundStarted    │ │
/// │ └──────────────────────────┘ │
/// └──────────────────────────────┘
/// ```
///
/// `seq` lets a client verify it saw every notification in issue order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub seq: u64,
    pub timestamp: u64,
    pub payload: T,
}

// =========================================================================
// Tests
// =========================================================================
