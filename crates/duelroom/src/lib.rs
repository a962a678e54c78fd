//! # Duelroom
//!
//! A two-player matchmaking and timed-duel server.
//!
//! Anonymous clients connect over WebSocket and are paired, in arrival
//! order, into two-seat rooms. The first arrival is FIRST, the second is
//! SECOND. SECOND starts the round; it ends when someone reports solving
//! the puzzle, when the deadline passes, when a player is knocked out or
//! when a player walks away. Every room runs on its own task, and rooms
//! never wait on each other.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use duelroom::prelude::*;
//!
//! # async fn run() -> Result<(), DuelroomError> {
//! let server = DuelServer::builder().bind("0.0.0.0:8080").build().await?;
//! server.run().await
//! # }
//! ```

pub mod config;
mod error;
pub mod gateway;
mod handler;
pub mod router;
mod server;

pub use error::DuelroomError;
pub use server::{DuelServer, DuelServerBuilder};

/// The types most programs need, in one import.
pub mod prelude {
    pub use crate::config::{ConfigError, ServerConfig};
    pub use crate::gateway::{BroadcastGateway, Outbox};
    pub use crate::router::{Admission, EventRouter, SHUTDOWN_NOTICE};
    pub use crate::{DuelServer, DuelServerBuilder, DuelroomError};
    pub use duelroom_protocol::{
        Ability, ClientMessage, ConnectionId, EndReason, Envelope,
        HealthReport, Outcome, Role, RoomId, Seat, ServerMessage,
    };
    pub use duelroom_room::{Phase, RoomError, RoomSettings};
}
