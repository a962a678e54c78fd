//! Transport abstraction layer for Duelroom.
//!
//! Provides the [`Transport`] and [`Connection`] traits so the matchmaking
//! core never touches sockets directly. The server only needs two things
//! from the network: a stream of accepted peers, and a way to move framed
//! bytes in both directions on each of them.
//!
//! Identity is NOT handled here. A connection becomes a player only when
//! the connection registry admits it and hands out a `ConnectionId`.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    DEFAULT_HANDSHAKE_TIMEOUT, PendingHandshake, WebSocketConnection,
    WebSocketTransport,
};

use std::net::SocketAddr;

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// A peer that was accepted but has not finished its upgrade.
    type Pending: Handshake<Connection = Self::Connection, Error = Self::Error>;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next incoming peer.
    ///
    /// Returns as soon as the peer is accepted. The upgrade runs later in
    /// [`Handshake::complete`], so a peer that never finishes it cannot
    /// hold up the next `accept`.
    async fn accept(&mut self) -> Result<Self::Pending, Self::Error>;

    /// Returns the address the transport is listening on.
    fn local_addr(&self) -> Result<SocketAddr, Self::Error>;
}

/// The second half of accepting a peer. Run it on the connection's own
/// task.
pub trait Handshake: Send + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// The remote peer's address, known before the upgrade.
    fn peer_addr(&self) -> SocketAddr;

    /// Completes the upgrade, giving up after the transport's handshake
    /// timeout.
    async fn complete(self) -> Result<Self::Connection, Self::Error>;
}

/// A single connection that can send and receive framed bytes.
///
/// Sending and receiving must be usable at the same time from different
/// tasks: the outbound pump writes while the inbound loop waits for the
/// next frame.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// The remote peer's address.
    fn peer_addr(&self) -> SocketAddr;
}
