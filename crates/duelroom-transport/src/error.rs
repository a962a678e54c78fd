use std::io;
use std::net::SocketAddr;
use std::time::Duration;

/// Transport failures. Every per-connection variant carries the peer so
/// log lines can be tied back to a client.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("bind {addr} failed: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Accepting a TCP connection (or reading the bound address) failed.
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    /// The WebSocket upgrade with the peer failed.
    #[error("handshake with {peer} failed: {reason}")]
    Handshake { peer: SocketAddr, reason: String },

    /// The peer connected but did not finish the upgrade in time.
    #[error("handshake with {peer} timed out after {limit:?}")]
    HandshakeTimeout { peer: SocketAddr, limit: Duration },

    /// A frame could not be written. The peer is usually gone.
    #[error("send to {peer} failed: {reason}")]
    Send { peer: SocketAddr, reason: String },

    #[error("receive from {peer} failed: {reason}")]
    Receive { peer: SocketAddr, reason: String },
}
