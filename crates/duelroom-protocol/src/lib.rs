//! Wire protocol for Duelroom.
//!
//! This crate defines the "language" that browser clients and the server
//! speak:
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`Envelope`], the
//!   id newtypes, [`Role`], [`Outcome`]) — the structures on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those messages are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong doing that.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw frames) and the
//! matchmaking core. It knows nothing about connections or rooms as live
//! objects, only how to name and serialize them.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientMessage) → Router → Rooms
//! Rooms → Gateway (ServerMessage) → Protocol (Envelope) → Transport
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    Ability, ClientMessage, ConnectionId, EndReason, Envelope, HealthReport,
    Outcome, Role, RoomId, Seat, ServerMessage,
};
