//! End-to-end tests over real WebSocket connections.

use canvas_bridge_client::PeerClient;
use canvas_bridge_core::{close_code, Catalog, ComponentDescriptor, SharedSecret};
use canvas_bridge_server::{server, Bridge, BridgeError, CatalogStore, Config, Dispatcher};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type RawWs = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SECRET: &str = "K";

fn config(command_timeout_ms: u64) -> Config {
    Config {
        secret: SharedSecret::new(SECRET),
        command_timeout: Duration::from_millis(command_timeout_ms),
        handshake_timeout: Duration::from_millis(300),
        default_secret: false,
        ..Config::default()
    }
}

async fn start(config: Config) -> (Bridge, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let bridge = Bridge::new(config.command_timeout, CatalogStore::shared());
    tokio::spawn({
        let bridge = bridge.clone();
        async move { server::run(listener, bridge, &config).await }
    });
    (bridge, url)
}

async fn wait_for<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

async fn raw_connect(url: &str) -> RawWs {
    tokio_tungstenite::connect_async(url).await.unwrap().0
}

async fn next_json(ws: &mut RawWs) -> Value {
    loop {
        match ws.next().await.unwrap().unwrap() {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Close(frame) => panic!("unexpected close: {frame:?}"),
            _ => continue,
        }
    }
}

async fn next_close_code(ws: &mut RawWs) -> Option<u16> {
    while let Some(msg) = ws.next().await {
        match msg {
            Ok(Message::Close(frame)) => return frame.map(|f| u16::from(f.code)),
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
    None
}

async fn send_json(ws: &mut RawWs, value: Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

#[tokio::test]
async fn valid_handshake_activates_peer() {
    let (bridge, url) = start(config(1_000)).await;
    assert!(!bridge.is_connected().await);

    let _peer = PeerClient::connect(&url, &SharedSecret::new(SECRET)).await.unwrap();
    assert!(bridge.is_connected().await);
}

#[tokio::test]
async fn wrong_secret_is_closed_with_invalid_code() {
    let (bridge, url) = start(config(1_000)).await;

    let err = PeerClient::connect(&url, &SharedSecret::new("not K"))
        .await
        .err()
        .unwrap();
    assert_eq!(err.close_code(), Some(close_code::INVALID_HANDSHAKE));
    assert!(!bridge.is_connected().await);
}

#[tokio::test]
async fn silent_peer_is_closed_with_timeout_code() {
    let (bridge, url) = start(config(1_000)).await;
    let mut ws = raw_connect(&url).await;

    let challenge = next_json(&mut ws).await;
    assert_eq!(challenge["type"], "handshake_challenge");
    assert_eq!(challenge["nonce"].as_str().unwrap().len(), 32);

    let code = tokio::time::timeout(Duration::from_secs(3), next_close_code(&mut ws))
        .await
        .unwrap();
    assert_eq!(code, Some(close_code::HANDSHAKE_TIMEOUT));
    assert!(!bridge.is_connected().await);
}

#[tokio::test]
async fn early_traffic_gets_notice_then_handshake_still_works() {
    let (bridge, url) = start(config(1_000)).await;
    let mut ws = raw_connect(&url).await;

    let challenge = next_json(&mut ws).await;
    let nonce = challenge["nonce"].as_str().unwrap().to_string();

    send_json(&mut ws, json!({"id": "x", "result": 1})).await;
    assert_eq!(next_json(&mut ws).await["type"], "handshake_required");
    assert!(!bridge.is_connected().await);

    let hash = SharedSecret::new(SECRET).sign(&nonce).unwrap();
    send_json(&mut ws, json!({"type": "handshake_response", "hash": hash})).await;
    assert_eq!(next_json(&mut ws).await, json!({"type": "handshake_ok"}));
    assert!(bridge.is_connected().await);
}

#[tokio::test]
async fn create_frame_end_to_end() {
    let (bridge, url) = start(config(2_000)).await;
    let mut peer = PeerClient::connect(&url, &SharedSecret::new(SECRET)).await.unwrap();

    let peer_task = tokio::spawn(async move {
        let handler = |command: &str, params: &Value| {
            if command == "create_frame"
                && *params == json!({"name": "Card", "width": 200, "height": 120})
            {
                Ok(json!({"nodeId": "1:2", "name": "Card"}))
            } else {
                Err(format!("unexpected {command} {params}"))
            }
        };
        peer.serve(&handler).await
    });

    let dispatcher = Dispatcher::new(bridge.clone());
    let result = dispatcher
        .call("create_frame", &json!({"name": "Card", "width": 200, "height": 120}))
        .await;
    assert!(!result.is_error, "{}", result.message());
    let value: Value = serde_json::from_str(&result.message()).unwrap();
    assert_eq!(value, json!({"nodeId": "1:2", "name": "Card"}));
    assert_eq!(bridge.pending_count().await, 0);

    peer_task.abort();
}

#[tokio::test]
async fn remote_error_reaches_caller_verbatim() {
    let (bridge, url) = start(config(2_000)).await;
    let mut peer = PeerClient::connect(&url, &SharedSecret::new(SECRET)).await.unwrap();
    let peer_task = tokio::spawn(async move {
        let handler = |_: &str, _: &Value| Err::<Value, _>("Node 9:9 not found".to_string());
        peer.serve(&handler).await
    });

    let err = bridge
        .send_command("get_node_info", json!({"nodeId": "9:9"}))
        .await
        .unwrap_err();
    assert_eq!(err, BridgeError::RemoteError("Node 9:9 not found".into()));
    peer_task.abort();
}

#[tokio::test]
async fn replies_correlate_by_id_not_order() {
    let (bridge, url) = start(config(2_000)).await;
    let mut peer = PeerClient::connect(&url, &SharedSecret::new(SECRET)).await.unwrap();

    let a = bridge.issue("a", Value::Null).await.unwrap();
    let b = bridge.issue("b", Value::Null).await.unwrap();
    let cmd_a = peer.next_command().await.unwrap();
    let cmd_b = peer.next_command().await.unwrap();
    assert_eq!((cmd_a.command.as_str(), cmd_b.command.as_str()), ("a", "b"));

    peer.reply(&cmd_b.id, Ok(json!("B"))).await.unwrap();
    assert_eq!(b.outcome().await.unwrap(), json!("B"));
    assert_eq!(bridge.pending_count().await, 1);

    peer.reply(&cmd_a.id, Ok(json!("A"))).await.unwrap();
    assert_eq!(a.outcome().await.unwrap(), json!("A"));
}

#[tokio::test]
async fn timeout_then_late_reply_is_dropped() {
    let (bridge, url) = start(config(150)).await;
    let mut peer = PeerClient::connect(&url, &SharedSecret::new(SECRET)).await.unwrap();

    let pending = bridge.issue("slow", Value::Null).await.unwrap();
    let cmd = peer.next_command().await.unwrap();

    let err = pending.outcome().await.unwrap_err();
    assert!(matches!(err, BridgeError::RequestTimeout { .. }));
    assert_eq!(bridge.pending_count().await, 0);

    peer.reply(&cmd.id, Ok(json!("too late"))).await.unwrap();

    // The connection keeps working afterwards.
    let next = bridge.issue("fast", Value::Null).await.unwrap();
    let cmd = peer.next_command().await.unwrap();
    peer.reply(&cmd.id, Ok(json!("ok"))).await.unwrap();
    assert_eq!(next.outcome().await.unwrap(), json!("ok"));
    assert!(bridge.is_connected().await);
}

#[tokio::test]
async fn peer_disconnect_fails_all_pending() {
    let (bridge, url) = start(config(10_000)).await;
    let mut peer = PeerClient::connect(&url, &SharedSecret::new(SECRET)).await.unwrap();

    let a = bridge.issue("a", Value::Null).await.unwrap();
    let b = bridge.issue("b", Value::Null).await.unwrap();
    peer.next_command().await.unwrap();
    assert_eq!(bridge.pending_count().await, 2);

    peer.close().await.unwrap();

    assert_eq!(a.outcome().await.unwrap_err(), BridgeError::PeerDisconnected);
    assert_eq!(b.outcome().await.unwrap_err(), BridgeError::PeerDisconnected);
    assert_eq!(bridge.pending_count().await, 0);
    assert!(!bridge.is_connected().await);

    let err = bridge.send_command("c", Value::Null).await.unwrap_err();
    assert_eq!(err, BridgeError::NotConnected);
}

#[tokio::test]
async fn malformed_handshake_response_is_rejected_at_once() {
    let (bridge, url) = start(Config {
        handshake_timeout: Duration::from_secs(10),
        ..config(1_000)
    })
    .await;
    let mut ws = raw_connect(&url).await;
    next_json(&mut ws).await;

    send_json(&mut ws, json!({"type": "ping"})).await;
    assert_eq!(next_json(&mut ws).await["type"], "handshake_required");

    send_json(&mut ws, json!({"type": "handshake_response", "hash": 123})).await;
    let code = tokio::time::timeout(Duration::from_secs(2), next_close_code(&mut ws))
        .await
        .unwrap();
    assert_eq!(code, Some(close_code::INVALID_HANDSHAKE));
    assert!(!bridge.is_connected().await);
}

#[tokio::test]
async fn failed_handshakes_leave_active_peer_alone() {
    let (bridge, url) = start(config(2_000)).await;
    let mut peer = PeerClient::connect(&url, &SharedSecret::new(SECRET)).await.unwrap();

    let err = PeerClient::connect(&url, &SharedSecret::new("not K"))
        .await
        .err()
        .unwrap();
    assert_eq!(err.close_code(), Some(close_code::INVALID_HANDSHAKE));

    let mut silent = raw_connect(&url).await;
    next_json(&mut silent).await;
    let code = tokio::time::timeout(Duration::from_secs(3), next_close_code(&mut silent))
        .await
        .unwrap();
    assert_eq!(code, Some(close_code::HANDSHAKE_TIMEOUT));

    assert!(bridge.is_connected().await);
    let pending = bridge.issue("get_selection", Value::Null).await.unwrap();
    let cmd = peer.next_command().await.unwrap();
    peer.reply(&cmd.id, Ok(json!(["1:2"]))).await.unwrap();
    assert_eq!(pending.outcome().await.unwrap(), json!(["1:2"]));
}

#[tokio::test]
async fn newer_peer_displaces_older() {
    let (bridge, url) = start(config(2_000)).await;
    let secret = SharedSecret::new(SECRET);
    let mut old = PeerClient::connect(&url, &secret).await.unwrap();
    let mut new = PeerClient::connect(&url, &secret).await.unwrap();

    let err = old.next_command().await.unwrap_err();
    assert_eq!(err.close_code(), Some(close_code::DISPLACED));

    // Give the old connection's task time to finish; it must not clear
    // the slot the new peer holds.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(bridge.is_connected().await);

    let pending = bridge.issue("get_selection", Value::Null).await.unwrap();
    let cmd = new.next_command().await.unwrap();
    new.reply(&cmd.id, Ok(json!([]))).await.unwrap();
    assert_eq!(pending.outcome().await.unwrap(), json!([]));
}

#[tokio::test]
async fn catalog_push_replaces_and_is_searchable() {
    let (bridge, url) = start(config(2_000)).await;
    let mut peer = PeerClient::connect(&url, &SharedSecret::new(SECRET)).await.unwrap();

    let catalog = |components: Vec<ComponentDescriptor>, scanned_at: u64| Catalog {
        source_id: "lib".into(),
        source_name: "Library".into(),
        components,
        styles: Vec::new(),
        scanned_at: json!(scanned_at),
    };
    peer.push_catalog(catalog(vec![ComponentDescriptor::new("OldBtn", "")], 1))
        .await
        .unwrap();
    peer.push_catalog(catalog(
        vec![
            ComponentDescriptor::new("IconBtn", ""),
            ComponentDescriptor::new("Card", "container"),
        ],
        2,
    ))
    .await
    .unwrap();

    wait_for(|| {
        let bridge = bridge.clone();
        async move {
            let store = bridge.catalogs().read().await;
            store.get("lib").is_some_and(|c| c.scanned_at == 2)
        }
    })
    .await;

    let dispatcher = Dispatcher::new(bridge.clone());
    let found = dispatcher.call("search_components", &json!({"query": "btn"})).await;
    let found: Value = serde_json::from_str(&found.message()).unwrap();
    assert_eq!(found["count"], 1);
    assert_eq!(found["matches"][0]["name"], "IconBtn");
    assert_eq!(bridge.pending_count().await, 0);
}

#[tokio::test]
async fn connection_status_tracks_peer() {
    let (bridge, url) = start(config(1_000)).await;
    let dispatcher = Dispatcher::new(bridge.clone());
    let status = |r: canvas_bridge_server::ToolResult| -> bool {
        serde_json::from_str::<Value>(&r.message()).unwrap()["connected"]
            .as_bool()
            .unwrap()
    };

    assert!(!status(dispatcher.call("connection_status", &json!({})).await));
    let peer = PeerClient::connect(&url, &SharedSecret::new(SECRET)).await.unwrap();
    assert!(status(dispatcher.call("connection_status", &json!({})).await));

    peer.close().await.unwrap();
    wait_for(|| {
        let bridge = bridge.clone();
        async move { !bridge.is_connected().await }
    })
    .await;
    assert!(!status(dispatcher.call("connection_status", &json!({})).await));
}
