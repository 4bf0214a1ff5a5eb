//! End-to-end tests: the router is served on an ephemeral port and driven over real sockets.

use std::{sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::{net::TcpListener, sync::oneshot};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{self, Message},
};
use tsudoi_server::{
    config::ServerConfig,
    ui::{AppState, Server},
};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Server running in the test process
struct TestServer {
    port: u16,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let port = listener.local_addr().unwrap().port();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let server = Server::new(Arc::new(AppState::in_memory(ServerConfig::default())));
        tokio::spawn(async move {
            let _ = server
                .serve(listener, async move {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Self {
            port,
            shutdown: Some(shutdown_tx),
        }
    }

    fn ws_url(&self, user_id: &str, display_name: &str) -> String {
        format!(
            "ws://127.0.0.1:{}/ws?userId={}&displayName={}",
            self.port, user_id, display_name
        )
    }

    fn http_url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// WebSocket client speaking the JSON frame protocol
struct TestClient {
    socket: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    connection_id: String,
}

impl TestClient {
    /// Connect and consume the initial `connected` frame
    async fn connect(server: &TestServer, user_id: &str, display_name: &str) -> Self {
        let (socket, _) = connect_async(server.ws_url(user_id, display_name))
            .await
            .expect("Failed to connect");
        let mut client = Self {
            socket,
            connection_id: String::new(),
        };
        let connected = client.recv().await;
        assert_eq!(connected["type"], "connected");
        assert_eq!(connected["userId"], user_id);
        client.connection_id = connected["connectionId"].as_str().unwrap().to_string();
        client
    }

    /// Connect and join `room_id`, consuming `room-info`
    async fn join(server: &TestServer, user_id: &str, room_id: &str) -> (Self, Value) {
        let mut client = Self::connect(server, user_id, user_id).await;
        client
            .send(json!({"type": "join-room", "roomId": room_id}))
            .await;
        let info = client.recv_until("room-info").await;
        (client, info)
    }

    async fn send(&mut self, frame: Value) {
        self.socket
            .send(Message::Text(frame.to_string().into()))
            .await
            .expect("Failed to send");
    }

    async fn recv(&mut self) -> Value {
        loop {
            let msg = tokio::time::timeout(RECV_TIMEOUT, self.socket.next())
                .await
                .expect("Timed out waiting for a frame")
                .expect("Socket closed")
                .expect("Socket error");
            if let Message::Text(text) = msg {
                return serde_json::from_str(text.as_str()).expect("Invalid JSON frame");
            }
        }
    }

    /// Skip frames until one of type `kind` arrives
    async fn recv_until(&mut self, kind: &str) -> Value {
        loop {
            let frame = self.recv().await;
            if frame["type"] == kind {
                return frame;
            }
        }
    }

    /// Assert that nothing arrives within `wait`
    async fn expect_silence(&mut self, wait: Duration) {
        if let Ok(Some(Ok(Message::Text(text)))) =
            tokio::time::timeout(wait, self.socket.next()).await
        {
            panic!("Unexpected frame: {}", text);
        }
    }

    async fn close(mut self) {
        let _ = self.socket.close(None).await;
    }
}

#[tokio::test]
async fn test_missing_user_id_is_rejected() {
    // テスト項目: userId 無しの接続は 401 で拒否される
    // given (前提条件):
    let server = TestServer::start().await;
    let url = format!("ws://127.0.0.1:{}/ws?displayName=anon", server.port);

    // when (操作):
    let result = connect_async(url).await;

    // then (期待する結果):
    match result {
        Err(tungstenite::Error::Http(response)) => assert_eq!(response.status(), 401),
        other => panic!("expected HTTP 401, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_lounge_chat_and_reactions() {
    // テスト項目: チャンネル作成 → 参加 → メッセージ → リアクションが 2 人に同じように届く
    // given (前提条件):
    let server = TestServer::start().await;
    let (mut alice, _) = TestClient::join(&server, "alice", "den").await;
    let (mut bob, info) = TestClient::join(&server, "bob", "den").await;
    assert_eq!(info["users"].as_array().unwrap().len(), 2);
    alice.recv_until("user-joined-room").await;

    // when (操作):
    alice
        .send(json!({"type": "create-channel", "name": "Lounge", "kind": "text"}))
        .await;
    let created_a = alice.recv_until("channels-updated").await;
    let created_b = bob.recv_until("channels-updated").await;

    alice
        .send(json!({"type": "join-channel", "channelId": "lounge"}))
        .await;
    alice.recv_until("message-history").await;
    bob.send(json!({"type": "join-channel", "channelId": "lounge"}))
        .await;
    let history = bob.recv_until("message-history").await;
    alice.recv_until("user-joined-channel").await;

    alice
        .send(json!({"type": "chat-message", "text": "welcome"}))
        .await;
    let chat_a = alice.recv_until("chat-message").await;
    let chat_b = bob.recv_until("chat-message").await;
    let message_id = chat_b["id"].as_str().unwrap().to_string();

    for _ in 0..2 {
        bob.send(json!({
            "type": "reaction-add",
            "channelId": "lounge",
            "messageId": message_id,
            "emoji": "👍"
        }))
        .await;
    }
    alice.recv_until("reaction-update").await;
    let reaction = alice.recv_until("reaction-update").await;

    // then (期待する結果):
    assert_eq!(created_a, created_b);
    assert!(
        created_a["channels"]
            .as_array()
            .unwrap()
            .iter()
            .any(|c| c["id"] == "lounge" && c["name"] == "Lounge" && c["type"] == "text")
    );
    assert_eq!(history["messages"], json!([]));
    assert_eq!(chat_a, chat_b);
    assert_eq!(chat_a["text"], "welcome");
    assert_eq!(chat_a["displayName"], "alice");
    assert_eq!(chat_a["channelId"], "lounge");
    assert_eq!(reaction["messageId"], message_id);
    assert_eq!(
        reaction["reactions"]["👍"],
        json!({"count": 1, "users": ["bob"]})
    );
}

#[tokio::test]
async fn test_voice_newcomer_offers_to_existing_member() {
    // テスト項目: voice の新規参加者は既存メンバーを channel-users で知り、シグナリングは宛先にだけ届く
    // given (前提条件):
    let server = TestServer::start().await;
    let (mut alice, _) = TestClient::join(&server, "alice", "den").await;
    let (mut bob, _) = TestClient::join(&server, "bob", "den").await;
    let (mut carol, _) = TestClient::join(&server, "carol", "den").await;
    alice
        .send(json!({"type": "join-channel", "channelId": "voice-1"}))
        .await;
    let first = alice.recv_until("channel-users").await;
    assert_eq!(first["users"], json!([]));

    // when (操作):
    bob.send(json!({"type": "join-channel", "channelId": "voice-1"}))
        .await;
    let existing = bob.recv_until("channel-users").await;
    let joined = alice.recv_until("user-joined-channel").await;

    bob.send(json!({
        "type": "signal-offer",
        "targetConnectionId": alice.connection_id,
        "payload": {"type": "offer", "sdp": "v=0"}
    }))
    .await;
    let offer = alice.recv_until("signal-offer").await;

    alice
        .send(json!({
            "type": "webrtc-answer",
            "targetId": bob.connection_id,
            "answer": {"type": "answer", "sdp": "v=0"}
        }))
        .await;
    let answer = bob.recv_until("signal-answer").await;

    // then (期待する結果):
    let existing_ids: Vec<&str> = existing["users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["connectionId"].as_str().unwrap())
        .collect();
    assert_eq!(existing_ids, vec![alice.connection_id.as_str()]);
    assert_eq!(joined["connectionId"], bob.connection_id);
    assert_eq!(joined["channelId"], "voice-1");
    assert_eq!(offer["fromConnectionId"], bob.connection_id);
    assert_eq!(offer["displayName"], "bob");
    assert_eq!(offer["payload"]["sdp"], "v=0");
    assert_eq!(answer["fromConnectionId"], alice.connection_id);
    assert_eq!(answer["payload"]["type"], "answer");

    // carol は voice-1 の channels-updated しか受け取らない
    loop {
        let frame = carol.recv().await;
        assert!(!frame["type"].as_str().unwrap().starts_with("signal-"));
        if frame["type"] == "channels-updated"
            && frame["channels"]
                .as_array()
                .unwrap()
                .iter()
                .any(|c| c["id"] == "voice-1" && c["memberCount"] == 2)
        {
            break;
        }
    }
    carol.expect_silence(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_duplicate_channel_reports_error_to_sender_only() {
    // テスト項目: 重複したチャンネル作成は送信者にだけ channel-error が届く
    // given (前提条件):
    let server = TestServer::start().await;
    let (mut alice, _) = TestClient::join(&server, "alice", "den").await;
    let (mut bob, _) = TestClient::join(&server, "bob", "den").await;
    alice.recv_until("user-joined-room").await;

    // when (操作):
    alice
        .send(json!({"type": "create-channel", "channelName": "general", "channelType": "text"}))
        .await;
    let error = alice.recv().await;

    // then (期待する結果):
    assert_eq!(
        error,
        json!({"type": "channel-error", "message": "Channel already exists"})
    );
    bob.expect_silence(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_unparseable_frame_is_ignored() {
    // テスト項目: 解釈できないフレームは無視され、接続は維持される
    // given (前提条件):
    let server = TestServer::start().await;
    let (mut alice, _) = TestClient::join(&server, "alice", "den").await;

    // when (操作):
    alice.send(json!({"type": "no-such-event"})).await;
    alice
        .socket
        .send(Message::Text("not json".into()))
        .await
        .unwrap();
    alice
        .send(json!({"type": "join-channel", "channelId": "general"}))
        .await;

    // then (期待する結果):
    let users = alice.recv().await;
    assert_eq!(users["type"], "channel-users");
}

#[tokio::test]
async fn test_disconnect_notifies_room() {
    // テスト項目: 切断すると残りのメンバーにチャンネル退出とルーム退出が届く
    // given (前提条件):
    let server = TestServer::start().await;
    let (mut alice, _) = TestClient::join(&server, "alice", "den").await;
    let (mut bob, _) = TestClient::join(&server, "bob", "den").await;
    bob.send(json!({"type": "join-channel", "channelId": "voice-1"}))
        .await;
    bob.recv_until("channels-updated").await;
    alice.recv_until("channels-updated").await;
    let bob_id = bob.connection_id.clone();

    // when (操作):
    bob.close().await;

    // then (期待する結果):
    let left_channel = alice.recv_until("user-left-channel").await;
    assert_eq!(left_channel["connectionId"], bob_id);
    assert_eq!(left_channel["channelId"], "voice-1");
    let left_room = alice.recv_until("user-left-room").await;
    assert_eq!(left_room["connectionId"], bob_id);
    assert_eq!(left_room["displayName"], "bob");
}

#[tokio::test]
async fn test_http_room_inspection() {
    // テスト項目: ヘルスチェック・ルーム一覧・ルーム詳細の HTTP API
    // given (前提条件):
    let server = TestServer::start().await;
    let (mut alice, _) = TestClient::join(&server, "alice", "den").await;
    alice
        .send(json!({"type": "join-channel", "channelId": "general"}))
        .await;
    alice.recv_until("channels-updated").await;
    let http = reqwest::Client::new();

    // when (操作):
    let health: Value = http
        .get(server.http_url("/api/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let rooms: Value = http
        .get(server.http_url("/api/rooms"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let detail: Value = http
        .get(server.http_url("/api/rooms/den"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let missing = http
        .get(server.http_url("/api/rooms/nowhere"))
        .send()
        .await
        .unwrap();

    // then (期待する結果):
    assert_eq!(health, json!({"status": "ok"}));
    assert_eq!(rooms[0]["id"], "den");
    assert_eq!(rooms[0]["connectedCount"], 1);
    assert_eq!(rooms[0]["channelCount"], 2);
    assert!(rooms[0]["createdAt"].as_str().unwrap().contains('T'));
    assert_eq!(detail["users"][0]["userId"], "alice");
    assert_eq!(detail["channels"][0]["id"], "general");
    assert_eq!(detail["channels"][0]["memberCount"], 1);
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
}
