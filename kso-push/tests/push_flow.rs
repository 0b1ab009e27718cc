//! End-to-end push flow tests.
//!
//! Each test runs an in-process WebSocket server standing in for the push
//! service: it accepts the signed handshake, feeds wire frames to the
//! client, and observes the acknowledgements the client writes back.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http;
use tokio_tungstenite::tungstenite::Message;

use kso_core::{ClientConfig, KsoError};
use kso_push::{ConnectionState, Event, EventCipher, EventDispatcher, PushClient, Signer};

const APP_ID: &str = "test_app_id";
const APP_SECRET: &str = "test_app_secret";
const NONCE: &str = "nonce_12345678901234567890";

const WAIT: Duration = Duration::from_secs(5);

/// A wire-valid event frame: encrypted payload plus matching signature.
fn event_frame(topic: &str, operation: &str, plaintext: &str, nonce: &str) -> String {
    let encrypted = EventCipher::encrypt(APP_SECRET, plaintext, nonce).unwrap();
    let signature =
        Signer::new(APP_ID, APP_SECRET).event_signature(topic, nonce, 1704067200, &encrypted);
    serde_json::json!({
        "topic": topic,
        "operation": operation,
        "time": 1704067200,
        "nonce": nonce,
        "signature": signature,
        "encrypted_data": encrypted,
    })
    .to_string()
}

async fn bind_server() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, format!("ws://{addr}/v7/event/ws"))
}

fn fast_config(endpoint: &str) -> ClientConfig {
    let mut config = ClientConfig::new(APP_ID, APP_SECRET).with_endpoint(endpoint);
    config.reconnect.base_interval_ms = 50;
    config.reconnect.max_interval_ms = 100;
    config.reconnect.jitter = 0.0;
    config
}

/// A client whose handler forwards every event into a channel.
fn recording_client(config: ClientConfig) -> (Arc<PushClient>, mpsc::Receiver<Event>) {
    let (event_tx, event_rx) = mpsc::channel(16);
    let client = Arc::new(PushClient::new(config).with_handler(move |event| {
        let event_tx = event_tx.clone();
        async move {
            event_tx.send(event).await.ok();
            Ok(())
        }
    }));
    (client, event_rx)
}

#[tokio::test]
async fn e2e_event_is_delivered_and_acked() {
    let (listener, endpoint) = bind_server().await;
    let (auth_tx, auth_rx) = oneshot::channel();
    let (ack_tx, ack_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            let auth = req
                .headers()
                .get("X-Kso-Authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let ack_mode = req
                .headers()
                .get("X-Ack-Mode")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let _ = auth_tx.send((auth, ack_mode));
            Ok(resp)
        };
        let mut ws = accept_hdr_async(stream, callback).await.unwrap();

        let frame = event_frame("kso.app_chat.message", "create", r#"{"hello":"world"}"#, NONCE);
        ws.send(Message::Text(frame.into())).await.unwrap();

        let mut ack_tx = Some(ack_tx);
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                if let Some(tx) = ack_tx.take() {
                    let _ = tx.send(text.to_string());
                }
            }
        }
    });

    let (client, mut events) = recording_client(fast_config(&endpoint));
    let driver = {
        let client = client.clone();
        tokio::spawn(async move { client.start().await })
    };

    let (auth, ack_mode) = timeout(WAIT, auth_rx).await.unwrap().unwrap();
    assert!(auth.starts_with("KSO-1 test_app_id:"), "auth header: {auth}");
    assert_eq!(ack_mode, "required");

    let event = timeout(WAIT, events.recv()).await.unwrap().unwrap();
    assert_eq!(event.event_code(), "kso.app_chat.message.create");
    assert_eq!(event.data(), r#"{"hello":"world"}"#);
    assert_eq!(client.state(), ConnectionState::Connected);

    let ack: serde_json::Value =
        serde_json::from_str(&timeout(WAIT, ack_rx).await.unwrap().unwrap()).unwrap();
    assert_eq!(ack["type"], "ack");
    assert_eq!(ack["code"], 200);
    assert_eq!(ack["nonce"], NONCE);

    client.stop().await;
    assert_eq!(client.state(), ConnectionState::Closed);
    assert!(timeout(WAIT, driver).await.unwrap().unwrap().is_ok());
}

#[tokio::test]
async fn e2e_typed_dispatch_parses_payload() {
    let (listener, endpoint) = bind_server().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let data = r#"{"company_id":"c","chat":{"id":"x","type":"single"},"sender":{"type":"user","id":"u"},"send_time":1,"message":{"id":"m","type":"text","content":{"text":"hi"}}}"#;
        let frame = event_frame("kso.app_chat.message", "create", data, NONCE);
        ws.send(Message::Text(frame.into())).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let (seen_tx, seen_rx) = oneshot::channel();
    let seen_tx = Arc::new(tokio::sync::Mutex::new(Some(seen_tx)));
    let dispatcher = EventDispatcher::new().on_chat_message_create(move |typed| {
        let seen_tx = seen_tx.clone();
        async move {
            if let Some(tx) = seen_tx.lock().await.take() {
                let _ = tx.send((
                    typed.parsed_data.chat.id.clone(),
                    typed.parsed_data.message.content.text.clone(),
                ));
            }
            Ok(())
        }
    });

    let client = Arc::new(PushClient::new(fast_config(&endpoint)).with_dispatcher(dispatcher));
    let driver = {
        let client = client.clone();
        tokio::spawn(async move { client.start().await })
    };

    let (chat_id, text) = timeout(WAIT, seen_rx).await.unwrap().unwrap();
    assert_eq!(chat_id, "x");
    assert_eq!(text, "hi");

    client.stop().await;
    assert!(timeout(WAIT, driver).await.unwrap().unwrap().is_ok());
}

#[tokio::test]
async fn e2e_handler_failure_acks_500() {
    let (listener, endpoint) = bind_server().await;
    let (ack_tx, ack_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let frame = event_frame("t.opic", "create", "{}", NONCE);
        ws.send(Message::Text(frame.into())).await.unwrap();

        let mut ack_tx = Some(ack_tx);
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                if let Some(tx) = ack_tx.take() {
                    let _ = tx.send(text.to_string());
                }
            }
        }
    });

    let client = Arc::new(
        PushClient::new(fast_config(&endpoint))
            .with_handler(|_| async { Err(anyhow::anyhow!("handler exploded")) }),
    );
    let driver = {
        let client = client.clone();
        tokio::spawn(async move { client.start().await })
    };

    let ack: serde_json::Value =
        serde_json::from_str(&timeout(WAIT, ack_rx).await.unwrap().unwrap()).unwrap();
    assert_eq!(ack["code"], 500);
    assert!(ack["msg"].as_str().unwrap().contains("handler exploded"));

    client.stop().await;
    assert!(timeout(WAIT, driver).await.unwrap().unwrap().is_ok());
}

#[tokio::test]
async fn e2e_tampered_event_is_dropped_but_session_survives() {
    let (listener, endpoint) = bind_server().await;
    let (ack_tx, ack_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        // Signed time differs from the frame's time: signature mismatch.
        let bad = event_frame("t.opic", "create", "{}", "nonce_aaaaaaaaaaaaaaaa")
            .replace("1704067200", "1704067201");
        ws.send(Message::Text(bad.into())).await.unwrap();

        let good = event_frame("t.opic", "create", r#"{"ok":true}"#, NONCE);
        ws.send(Message::Text(good.into())).await.unwrap();

        let mut ack_tx = Some(ack_tx);
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                if let Some(tx) = ack_tx.take() {
                    let _ = tx.send(text.to_string());
                }
            }
        }
    });

    let (client, mut events) = recording_client(fast_config(&endpoint));
    let driver = {
        let client = client.clone();
        tokio::spawn(async move { client.start().await })
    };

    // Only the valid event arrives, and the only ack names its nonce.
    let event = timeout(WAIT, events.recv()).await.unwrap().unwrap();
    assert_eq!(event.data(), r#"{"ok":true}"#);

    let ack: serde_json::Value =
        serde_json::from_str(&timeout(WAIT, ack_rx).await.unwrap().unwrap()).unwrap();
    assert_eq!(ack["nonce"], NONCE);
    assert_eq!(ack["code"], 200);

    client.stop().await;
    assert!(events.try_recv().is_err());
    assert!(timeout(WAIT, driver).await.unwrap().unwrap().is_ok());
}

#[tokio::test]
async fn e2e_server_ping_is_answered_with_pong() {
    let (listener, endpoint) = bind_server().await;
    let (pong_tx, pong_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::Ping(b"heartbeat".as_slice().into()))
            .await
            .unwrap();

        let mut pong_tx = Some(pong_tx);
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Pong(payload) = msg {
                if let Some(tx) = pong_tx.take() {
                    let _ = tx.send(payload.to_vec());
                }
            }
        }
    });

    let (client, _events) = recording_client(fast_config(&endpoint));
    let driver = {
        let client = client.clone();
        tokio::spawn(async move { client.start().await })
    };

    let payload = timeout(WAIT, pong_rx).await.unwrap().unwrap();
    assert_eq!(payload, b"heartbeat");

    client.stop().await;
    assert!(timeout(WAIT, driver).await.unwrap().unwrap().is_ok());
}

#[tokio::test]
async fn e2e_goaway_connection_replaced_stops_reconnecting() {
    let (listener, endpoint) = bind_server().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let goaway =
            r#"{"type":"goaway","reason":"connection_replaced","message":"newer connection won"}"#;
        ws.send(Message::Text(goaway.to_string().into()))
            .await
            .unwrap();
        let _ = ws.close(None).await;
    });

    let (client, _events) = recording_client(fast_config(&endpoint));
    let driver = {
        let client = client.clone();
        tokio::spawn(async move { client.start().await })
    };

    // auto_reconnect was on, but the goaway disables it for good.
    let result = timeout(WAIT, driver).await.unwrap().unwrap();
    assert!(matches!(result, Err(KsoError::Connection(_))), "{result:?}");
    assert!(client.received_goaway());
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn e2e_reconnects_after_server_close() {
    let (listener, endpoint) = bind_server().await;

    tokio::spawn(async move {
        // First session: close immediately.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let _ = ws.close(None).await;

        // Second session: deliver an event.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let frame = event_frame("t.opic", "create", r#"{"round":2}"#, NONCE);
        ws.send(Message::Text(frame.into())).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let (client, mut events) = recording_client(fast_config(&endpoint));
    let driver = {
        let client = client.clone();
        tokio::spawn(async move { client.start().await })
    };

    let event = timeout(WAIT, events.recv()).await.unwrap().unwrap();
    assert_eq!(event.data(), r#"{"round":2}"#);

    client.stop().await;
    assert!(timeout(WAIT, driver).await.unwrap().unwrap().is_ok());
}

#[tokio::test]
async fn e2e_retry_budget_exhaustion_surfaces() {
    let (listener, endpoint) = bind_server().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let _ = ws.close(None).await;
    });

    let mut config = fast_config(&endpoint);
    config.reconnect.max_retry = 0;
    let (client, _events) = recording_client(config);

    let result = timeout(WAIT, client.start()).await.unwrap();
    assert!(matches!(result, Err(KsoError::ReconnectExceeded(0))), "{result:?}");
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn e2e_handshake_401_is_fatal() {
    let (listener, endpoint) = bind_server().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = |_req: &Request, _resp: Response| -> Result<Response, ErrorResponse> {
            Err(http::Response::builder().status(401).body(None).unwrap())
        };
        let _ = accept_hdr_async(stream, callback).await;
    });

    let (client, _events) = recording_client(fast_config(&endpoint));
    let result = timeout(WAIT, client.start()).await.unwrap();
    match result {
        Err(KsoError::Client { status, message }) => {
            assert_eq!(status, 401);
            assert_eq!(message, "Authentication failed");
        }
        other => panic!("expected client error, got {other:?}"),
    }
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn e2e_pong_deadline_forces_teardown() {
    let (listener, endpoint) = bind_server().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        // Say nothing: the client's pong deadline must fire.
        while let Some(Ok(_)) = ws.next().await {}
    });

    let mut config = fast_config(&endpoint).with_pong_timeout_ms(200);
    config.reconnect.auto_reconnect = false;
    let (client, _events) = recording_client(config);

    let result = timeout(WAIT, client.start()).await.unwrap();
    match result {
        Err(KsoError::Connection(msg)) => assert!(msg.contains("pong"), "{msg}"),
        other => panic!("expected connection error, got {other:?}"),
    }
}

#[tokio::test]
async fn e2e_second_start_while_running_is_rejected() {
    let (listener, endpoint) = bind_server().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let (client, _events) = recording_client(fast_config(&endpoint));
    let driver = {
        let client = client.clone();
        tokio::spawn(async move { client.start().await })
    };

    // Wait until the first start() owns the socket.
    let mut state_rx = client.state_receiver();
    timeout(WAIT, async {
        while *state_rx.borrow_and_update() != ConnectionState::Connected {
            state_rx.changed().await.unwrap();
        }
    })
    .await
    .unwrap();

    let second = client.start().await;
    assert!(matches!(second, Err(KsoError::AlreadyConnected)), "{second:?}");

    client.stop().await;
    assert!(timeout(WAIT, driver).await.unwrap().unwrap().is_ok());
}
