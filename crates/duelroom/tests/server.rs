//! End-to-end tests: a real server on a random port, real WebSocket
//! clients.

use std::time::Duration;

use duelroom::prelude::*;
use futures_util::{SinkExt, StreamExt};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

const RECV_LIMIT: Duration = Duration::from_secs(2);

/// Starts a server on a random port with the given round length.
/// Returns the address and a trigger that shuts the server down.
async fn start_server(round: Duration) -> (String, oneshot::Sender<()>) {
    start_with(DuelServer::builder().round_duration(round)).await
}

async fn start_with(builder: DuelServerBuilder) -> (String, oneshot::Sender<()>) {
    let server = builder
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let _ = server
            .run_until(async {
                let _ = stop_rx.await;
            })
            .await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    (addr, stop_tx)
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send_json(ws: &mut ClientWs, json: &str) {
    ws.send(Message::Text(json.to_owned().into()))
        .await
        .expect("send");
}

/// Next server message, skipping control frames.
async fn recv(ws: &mut ClientWs) -> Envelope<ServerMessage> {
    loop {
        let msg = tokio::time::timeout(RECV_LIMIT, ws.next())
            .await
            .expect("timed out waiting for a message")
            .expect("stream ended")
            .expect("recv error");
        match msg {
            Message::Text(text) => {
                return serde_json::from_str(text.as_str()).expect("decode envelope");
            }
            Message::Binary(data) => {
                return serde_json::from_slice(&data).expect("decode envelope");
            }
            _ => continue,
        }
    }
}

/// Connects a client and waits for its `role` assignment, so the next
/// client is guaranteed to arrive after it.
async fn join(addr: &str) -> (ClientWs, Role, RoomId) {
    let mut ws = connect(addr).await;
    match recv(&mut ws).await.payload {
        ServerMessage::Role { role, room_id } => (ws, role, room_id),
        other => panic!("expected role first, got {other:?}"),
    }
}

/// Two clients seated in the same room, opponentJoined consumed.
async fn duel(addr: &str) -> (ClientWs, ClientWs) {
    let (mut first, role_a, room_a) = join(addr).await;
    let (second, role_b, room_b) = join(addr).await;
    assert_eq!(role_a, Role::First);
    assert_eq!(role_b, Role::Second);
    assert_eq!(room_a, room_b);
    assert_eq!(recv(&mut first).await.payload.kind(), "opponentJoined");
    (first, second)
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_two_clients_are_paired() {
    let (addr, _stop) = start_server(Duration::from_secs(60)).await;
    let (_first, _second) = duel(&addr).await;

    // A third client opens the next room.
    let (_third, role, room_id) = join(&addr).await;
    assert_eq!(role, Role::First);
    assert_eq!(room_id, RoomId(2));
}

#[tokio::test]
async fn test_round_times_out() {
    let (addr, _stop) = start_server(Duration::from_millis(300)).await;
    let (mut first, mut second) = duel(&addr).await;

    send_json(&mut second, r#"{"type":"startGame"}"#).await;
    for ws in [&mut first, &mut second] {
        assert_eq!(
            recv(ws).await.payload,
            ServerMessage::RoundStarted { duration_secs: 0 }
        );
    }

    for ws in [&mut first, &mut second] {
        assert_eq!(
            recv(ws).await.payload,
            ServerMessage::RoundOver {
                outcome: Outcome::Timeout,
                reason: EndReason::Timeout,
            }
        );
    }
}

#[tokio::test]
async fn test_puzzle_solved_ends_round() {
    let (addr, _stop) = start_server(Duration::from_secs(60)).await;
    let (mut first, mut second) = duel(&addr).await;

    send_json(&mut second, r#"{"type":"startGame"}"#).await;
    recv(&mut first).await;
    recv(&mut second).await;

    send_json(&mut second, r#"{"type":"puzzleSolved"}"#).await;
    let win = ServerMessage::RoundOver {
        outcome: Outcome::Winner(Role::Second),
        reason: EndReason::PuzzleSolved,
    };
    assert_eq!(recv(&mut first).await.payload, win);
    assert_eq!(recv(&mut second).await.payload, win);
}

#[tokio::test]
async fn test_first_cannot_start() {
    let (addr, _stop) = start_server(Duration::from_secs(60)).await;
    let (mut first, _second) = duel(&addr).await;

    send_json(&mut first, r#"{"type":"startGame"}"#).await;

    assert!(matches!(
        recv(&mut first).await.payload,
        ServerMessage::Rejected { code: 403, .. }
    ));
}

#[tokio::test]
async fn test_bad_json_is_rejected_without_closing() {
    let (addr, _stop) = start_server(Duration::from_secs(60)).await;
    let (mut first, _second) = duel(&addr).await;

    send_json(&mut first, "this is not json").await;
    assert!(matches!(
        recv(&mut first).await.payload,
        ServerMessage::Rejected { code: 400, .. }
    ));

    send_json(&mut first, r#"{"type":"getPlayerNumber"}"#).await;
    assert_eq!(recv(&mut first).await.payload.kind(), "role");
}

#[tokio::test]
async fn test_sequence_numbers_increase() {
    let (addr, _stop) = start_server(Duration::from_secs(60)).await;
    let mut ws = connect(&addr).await;

    let role = recv(&mut ws).await;
    send_json(&mut ws, r#"{"type":"getRole"}"#).await;
    let again = recv(&mut ws).await;

    assert_eq!(role.seq, 0);
    assert_eq!(again.seq, 1);
    assert!(again.timestamp >= role.timestamp);
}

#[tokio::test]
async fn test_closing_mid_round_forfeits() {
    let (addr, _stop) = start_server(Duration::from_secs(60)).await;
    let (mut first, mut second) = duel(&addr).await;

    send_json(&mut second, r#"{"type":"startGame"}"#).await;
    recv(&mut first).await;
    recv(&mut second).await;

    first.close(None).await.expect("close");

    assert_eq!(
        recv(&mut second).await.payload,
        ServerMessage::RoundOver {
            outcome: Outcome::Winner(Role::Second),
            reason: EndReason::Forfeit,
        }
    );
}

#[tokio::test]
async fn test_shutdown_notifies_clients() {
    let (addr, stop) = start_server(Duration::from_secs(60)).await;
    let (mut first, mut second) = duel(&addr).await;

    stop.send(()).expect("server still running");

    let notice = ServerMessage::LobbyNotice {
        message: SHUTDOWN_NOTICE.into(),
    };
    assert_eq!(recv(&mut first).await.payload, notice);
    assert_eq!(recv(&mut second).await.payload, notice);
}

#[tokio::test]
async fn test_stalled_handshake_does_not_block_admission() {
    let (addr, _stop) = start_server(Duration::from_secs(60)).await;

    // Opens TCP but never sends the upgrade request.
    let _silent = TcpStream::connect(&addr).await.expect("tcp connect");
    tokio::time::sleep(Duration::from_millis(20)).await;

    let (_first, _second) = tokio::time::timeout(Duration::from_secs(3), duel(&addr))
        .await
        .expect("clients must be admitted while another peer stalls");
}

#[tokio::test]
async fn test_stalled_handshake_is_dropped_after_timeout() {
    let (addr, _stop) = start_with(
        DuelServer::builder().handshake_timeout(Duration::from_millis(100)),
    )
    .await;

    let mut silent = TcpStream::connect(&addr).await.expect("tcp connect");
    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(RECV_LIMIT, silent.read(&mut buf))
        .await
        .expect("server should hang up on the silent peer");

    // EOF or a reset both mean the server let go.
    assert!(matches!(read, Ok(0) | Err(_)));
}
