//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use crate::{Connection, Handshake, Transport, TransportError};

type WsStream = WebSocketStream<TcpStream>;

/// How long a peer gets to send its upgrade request unless
/// [`WebSocketTransport::with_handshake_timeout`] says otherwise.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
    handshake_timeout: Duration,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    ///
    /// Use port `0` to let the OS pick a free port, then read it back
    /// with [`Transport::local_addr`].
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| {
            TransportError::Bind {
                addr: addr.to_string(),
                source,
            }
        })?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self {
            listener,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        })
    }

    /// Sets how long each peer has to complete the WebSocket upgrade.
    pub fn with_handshake_timeout(mut self, limit: Duration) -> Self {
        self.handshake_timeout = limit;
        self
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Pending = PendingHandshake;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Pending, Self::Error> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::Accept)?;
        tracing::trace!(%peer, "accepted TCP connection");

        Ok(PendingHandshake {
            stream,
            peer,
            limit: self.handshake_timeout,
        })
    }

    fn local_addr(&self) -> Result<SocketAddr, Self::Error> {
        self.listener
            .local_addr()
            .map_err(TransportError::Accept)
    }
}

/// An accepted TCP peer that still owes us its WebSocket upgrade.
pub struct PendingHandshake {
    stream: TcpStream,
    peer: SocketAddr,
    limit: Duration,
}

impl Handshake for PendingHandshake {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    async fn complete(self) -> Result<Self::Connection, Self::Error> {
        let peer = self.peer;
        let ws = match tokio::time::timeout(
            self.limit,
            tokio_tungstenite::accept_async(self.stream),
        )
        .await
        {
            Ok(Ok(ws)) => ws,
            Ok(Err(e)) => {
                return Err(TransportError::Handshake {
                    peer,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(TransportError::HandshakeTimeout {
                    peer,
                    limit: self.limit,
                });
            }
        };

        tracing::debug!(%peer, "accepted WebSocket connection");

        // Split so the outbound pump never waits behind a pending read.
        let (sink, stream) = ws.split();
        Ok(WebSocketConnection {
            peer,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        })
    }
}

/// A single WebSocket connection.
///
/// Frames are sent as text when they are valid UTF-8 (JSON), which is what
/// browser clients expect, and as binary otherwise.
pub struct WebSocketConnection {
    peer: SocketAddr,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::Text(text.to_owned().into()),
            Err(_) => Message::Binary(data.to_vec().into()),
        };
        self.sink
            .lock()
            .await
            .send(msg)
            .await
            .map_err(|e| TransportError::Send {
                peer: self.peer,
                reason: e.to_string(),
            })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/raw frame
                Some(Err(e)) => {
                    return Err(TransportError::Receive {
                        peer: self.peer,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink
            .lock()
            .await
            .close()
            .await
            .map_err(|e| TransportError::Send {
                peer: self.peer,
                reason: e.to_string(),
            })
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}
