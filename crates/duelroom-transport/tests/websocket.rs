//! Integration tests for the WebSocket transport.
//!
//! These tests spin up a real WebSocket server and client on a random
//! local port to verify that frames actually flow over the network.

#[cfg(feature = "websocket")]
mod websocket {
    use std::sync::Arc;
    use std::time::Duration;

    use duelroom_transport::{
        Connection, Handshake, Transport, TransportError, WebSocketTransport,
    };
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    /// Binds on port 0, connects one client, and returns both ends.
    async fn connected_pair()
    -> (duelroom_transport::WebSocketConnection, ClientWs) {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("should have addr");

        let server_handle = tokio::spawn(async move {
            let pending = transport.accept().await.expect("should accept");
            pending.complete().await.expect("should upgrade")
        });

        let (client, _) =
            tokio_tungstenite::connect_async(format!("ws://{addr}"))
                .await
                .expect("client should connect");
        let server_conn = server_handle.await.expect("task should complete");
        (server_conn, client)
    }

    #[tokio::test]
    async fn test_bind_port_zero_reports_real_port() {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_accept_returns_before_upgrade() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().unwrap();

        // Plain TCP, no upgrade request ever sent.
        let _silent = tokio::net::TcpStream::connect(addr).await.unwrap();

        let pending =
            tokio::time::timeout(Duration::from_secs(2), transport.accept())
                .await
                .expect("accept must not wait for the upgrade")
                .expect("should accept");
        assert!(pending.peer_addr().ip().is_loopback());
    }

    #[tokio::test]
    async fn test_silent_peer_handshake_times_out() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind")
            .with_handshake_timeout(Duration::from_millis(100));
        let addr = transport.local_addr().unwrap();
        let _silent = tokio::net::TcpStream::connect(addr).await.unwrap();

        let pending = transport.accept().await.expect("should accept");
        let result =
            tokio::time::timeout(Duration::from_secs(2), pending.complete())
                .await
                .expect("the handshake timeout should fire first");

        assert!(matches!(
            result,
            Err(TransportError::HandshakeTimeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_utf8_frames_are_sent_as_text() {
        let (server_conn, mut client) = connected_pair().await;

        server_conn
            .send(br#"{"type":"role"}"#)
            .await
            .expect("send should succeed");

        let msg = client.next().await.unwrap().unwrap();
        assert!(msg.is_text(), "JSON should go out as a text frame");
        assert_eq!(msg.into_data().as_ref(), br#"{"type":"role"}"#);
    }

    #[tokio::test]
    async fn test_non_utf8_frames_are_sent_as_binary() {
        let (server_conn, mut client) = connected_pair().await;

        server_conn.send(&[0xff, 0x00, 0xfe]).await.unwrap();

        let msg = client.next().await.unwrap().unwrap();
        assert!(msg.is_binary());
        assert_eq!(msg.into_data().as_ref(), &[0xff, 0x00, 0xfe]);
    }

    #[tokio::test]
    async fn test_recv_accepts_text_and_binary() {
        let (server_conn, mut client) = connected_pair().await;

        client
            .send(Message::Text(r#"{"type":"getRole"}"#.into()))
            .await
            .unwrap();
        client
            .send(Message::Binary(b"raw".to_vec().into()))
            .await
            .unwrap();

        let first = server_conn.recv().await.unwrap().unwrap();
        assert_eq!(first, br#"{"type":"getRole"}"#);
        let second = server_conn.recv().await.unwrap().unwrap();
        assert_eq!(second, b"raw");
    }

    #[tokio::test]
    async fn test_send_does_not_wait_for_pending_recv() {
        // The inbound loop parks in recv() for the whole connection
        // lifetime; sends from another task must still go out.
        let (server_conn, mut client) = connected_pair().await;
        let server_conn = Arc::new(server_conn);

        let reader = Arc::clone(&server_conn);
        let pending = tokio::spawn(async move { reader.recv().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(
            Duration::from_secs(2),
            server_conn.send(b"while reading"),
        )
        .await
        .expect("send must not block behind recv")
        .unwrap();

        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"while reading");

        client.send(Message::Close(None)).await.unwrap();
        let result = pending.await.unwrap().unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_recv_returns_none_on_client_close() {
        let (server_conn, mut client) = connected_pair().await;

        client.send(Message::Close(None)).await.unwrap();

        let result = server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_peer_addr_is_loopback() {
        let (server_conn, _client) = connected_pair().await;
        assert!(server_conn.peer_addr().ip().is_loopback());
    }
}
