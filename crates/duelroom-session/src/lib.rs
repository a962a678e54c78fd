//! Connection tracking for Duelroom.
//!
//! Every socket the server accepts becomes a *connection*: a transient
//! [`ConnectionId`](duelroom_protocol::ConnectionId) plus the seat the
//! allocator gave it. There are no accounts and no reconnection, so the
//! connection id is the player's whole identity.
//!
//! # How it fits in the stack
//!
//! ```text
//! Router (above)  ← looks up a connection's seat to address its room
//!     ↕
//! Session Layer (this crate)  ← knows which connections are live
//!     ↕
//! Protocol Layer (below)  ← provides ConnectionId, RoomId, Role
//! ```

mod error;
mod record;
mod registry;

pub use error::SessionError;
pub use record::ConnectionRecord;
pub use registry::ConnectionRegistry;
