//! `DuelServer` builder and server loop.
//!
//! This is the entry point for running a Duelroom server. It ties
//! together all the layers: transport → router → registry/rooms → gateway.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use duelroom_protocol::Ability;
use duelroom_room::RoomSettings;
use duelroom_transport::{
    DEFAULT_HANDSHAKE_TIMEOUT, Handshake, Transport, WebSocketTransport,
};

use crate::DuelroomError;
use crate::config::ServerConfig;
use crate::handler::handle_connection;
use crate::router::EventRouter;

/// How long shutdown waits for pumps to flush the final notice.
const SHUTDOWN_FLUSH: Duration = Duration::from_millis(200);

/// Builder for configuring and starting a Duelroom server.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use duelroom::prelude::*;
///
/// # async fn run() -> Result<(), DuelroomError> {
/// let server = DuelServer::builder()
///     .bind("0.0.0.0:8080")
///     .round_duration(Duration::from_secs(60))
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DuelServerBuilder {
    bind_addr: String,
    settings: RoomSettings,
    idle_timeout: Option<Duration>,
    handshake_timeout: Duration,
}

impl DuelServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            settings: RoomSettings::default(),
            idle_timeout: None,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Starts from a loaded configuration file.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            bind_addr: config.listen.clone(),
            settings: config.room_settings(),
            idle_timeout: config.idle_timeout(),
            handshake_timeout: config.handshake_timeout(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets how long a round lasts.
    pub fn round_duration(mut self, duration: Duration) -> Self {
        self.settings.round_duration = duration;
        self
    }

    pub fn starting_health(mut self, health: u32) -> Self {
        self.settings.starting_health = health;
        self
    }

    pub fn hand(mut self, hand: Vec<Ability>) -> Self {
        self.settings.hand = hand;
        self
    }

    /// Closes connections that stay silent this long. `None` disables.
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// How long a new peer has to complete the WebSocket upgrade.
    pub fn handshake_timeout(mut self, limit: Duration) -> Self {
        self.handshake_timeout = limit;
        self
    }

    /// Binds the listener and builds the server.
    pub async fn build(self) -> Result<DuelServer, DuelroomError> {
        let transport = WebSocketTransport::bind(&self.bind_addr)
            .await?
            .with_handshake_timeout(self.handshake_timeout);
        let router = Arc::new(EventRouter::new(self.settings));
        Ok(DuelServer {
            transport,
            router,
            idle_timeout: self.idle_timeout,
        })
    }
}

impl Default for DuelServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Duelroom server.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to
/// start accepting connections.
pub struct DuelServer {
    transport: WebSocketTransport,
    router: Arc<EventRouter>,
    idle_timeout: Option<Duration>,
}

impl DuelServer {
    /// Creates a new builder.
    pub fn builder() -> DuelServerBuilder {
        DuelServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, DuelroomError> {
        Ok(self.transport.local_addr()?)
    }

    /// The router, for inspecting live state (connections, rooms).
    pub fn router(&self) -> Arc<EventRouter> {
        Arc::clone(&self.router)
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), DuelroomError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` resolves, then notifies every
    /// client and stops every room.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), DuelroomError> {
        let addr = self.local_addr()?;
        tracing::info!(%addr, "Duelroom server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(pending) => {
                        let router = Arc::clone(&self.router);
                        let idle_timeout = self.idle_timeout;
                        // The upgrade runs on the connection's own task so a
                        // silent peer never stalls the accept loop.
                        tokio::spawn(async move {
                            let peer = pending.peer_addr();
                            let conn = match pending.complete().await {
                                Ok(conn) => conn,
                                Err(e) => {
                                    tracing::debug!(%peer, error = %e, "handshake failed");
                                    return;
                                }
                            };
                            if let Err(e) = handle_connection(conn, router, idle_timeout).await {
                                tracing::debug!(%peer, error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                    }
                },
                () = &mut shutdown => break,
            }
        }

        self.router.shutdown().await;
        tokio::time::sleep(SHUTDOWN_FLUSH).await;
        tracing::info!("Duelroom server stopped");
        Ok(())
    }
}
