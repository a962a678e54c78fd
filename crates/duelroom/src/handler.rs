//! Per-connection handler: admission, the inbound loop, and the
//! outbound pump.
//!
//! Each accepted connection gets its own Tokio task running
//! [`handle_connection`]. The flow is:
//!   1. Admit the connection and seat it (the router does the work)
//!   2. Spawn the pump that drains the connection's outbox to the socket
//!   3. Loop: receive frames → router.dispatch
//!   4. On close, error or idle timeout: disconnect (via a drop guard)

use std::sync::Arc;
use std::time::Duration;

use duelroom_protocol::{Codec, ConnectionId, JsonCodec};
use duelroom_transport::{Connection, WebSocketConnection};

use crate::DuelroomError;
use crate::gateway::Outbox;
use crate::router::EventRouter;

/// Drop guard that disconnects the connection when the handler exits.
///
/// This ensures cleanup happens even if the handler panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async part.
struct DisconnectGuard {
    connection_id: ConnectionId,
    router: Arc<EventRouter>,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        let connection_id = self.connection_id;
        let router = Arc::clone(&self.router);
        tokio::spawn(async move {
            router.disconnect(connection_id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    router: Arc<EventRouter>,
    idle_timeout: Option<Duration>,
) -> Result<(), DuelroomError> {
    let peer = conn.peer_addr();
    let conn = Arc::new(conn);

    let admission = router.connect().await?;
    let connection_id = admission.connection_id;
    let _guard = DisconnectGuard {
        connection_id,
        router: Arc::clone(&router),
    };
    tracing::info!(%connection_id, %peer, seat = %admission.seat, "connection admitted");

    tokio::spawn(pump(Arc::clone(&conn), admission.outbox));

    loop {
        let received = match idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, conn.recv()).await {
                Ok(received) => received,
                Err(_) => {
                    tracing::info!(%connection_id, "idle timeout, closing");
                    let _ = conn.close().await;
                    break;
                }
            },
            None => conn.recv().await,
        };

        match received {
            Ok(Some(frame)) => router.dispatch(connection_id, &frame).await,
            Ok(None) => {
                tracing::info!(%connection_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%connection_id, error = %e, "recv error");
                break;
            }
        }
    }

    // _guard drops here → disconnect fires, which closes the outbox and
    // lets the pump finish.
    Ok(())
}

/// Drains one connection's outbox onto its socket.
///
/// The only code that writes to a connection. Stops when the outbox is
/// closed and empty, or when the socket refuses a write.
async fn pump(conn: Arc<WebSocketConnection>, mut outbox: Outbox) {
    let codec = JsonCodec;
    let connection_id = outbox.connection_id();

    while let Some(envelope) = outbox.next().await {
        let bytes = match codec.encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(%connection_id, error = %e, "failed to encode envelope");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(%connection_id, error = %e, "send failed, pump stopping");
            break;
        }
    }

    tracing::trace!(%connection_id, "pump finished");
}
