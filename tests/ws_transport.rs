// tests/ws_transport.rs
// End-to-end runs of the WebSocket transport against a loopback server

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use advisor::error::SessionError;
use advisor::session::{
    NoopObserver, SessionController, SessionSettings, SessionState, SessionUpdate,
};
use advisor::transport::WsConnector;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

// ============================================================================
// TEST SETUP UTILITIES
// ============================================================================

/// Serves exactly one WebSocket connection with `handler`
async fn spawn_server<F, Fut>(handler: F) -> String
where
    F: FnOnce(WebSocketStream<TcpStream>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        handler(ws).await;
    });

    format!("ws://{}/ws", addr)
}

async fn read_request(ws: &mut WebSocketStream<TcpStream>) -> serde_json::Value {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return serde_json::from_str(text.as_str()).unwrap(),
            Some(Ok(_)) => continue,
            other => panic!("Expected request frame, got {:?}", other),
        }
    }
}

async fn send_json(ws: &mut WebSocketStream<TcpStream>, value: serde_json::Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

/// Drain until the client finishes the close handshake
async fn drain(mut ws: WebSocketStream<TcpStream>) {
    while let Some(Ok(_)) = ws.next().await {}
}

fn controller(url: String, connect_timeout: Duration) -> SessionController<WsConnector> {
    SessionController::new(
        WsConnector::new(url),
        SessionSettings {
            connect_timeout,
            ..SessionSettings::default()
        },
    )
    .with_observer(Arc::new(NoopObserver))
}

// ============================================================================
// TESTS
// ============================================================================

#[tokio::test]
async fn test_full_session_over_websocket() {
    let (request_tx, request_rx) = oneshot::channel();

    let url = spawn_server(|mut ws| async move {
        let request = read_request(&mut ws).await;
        let _ = request_tx.send(request);

        send_json(&mut ws, serde_json::json!({
            "type": "answer",
            "question_number": 2,
            "question": "What discount rate applies?",
            "answer": "The rate implicit in the lease.",
            "timestamp": "2024-05-01T12:00:01Z"
        }))
        .await;
        send_json(&mut ws, serde_json::json!({
            "type": "answer",
            "question_number": 1,
            "question": "Is this a finance lease?",
            "answer": "Yes.",
            "timestamp": "2024-05-01T12:00:02Z"
        }))
        .await;
        send_json(&mut ws, serde_json::json!({
            "type": "summary",
            "summary": "## Finance lease",
            "sent_in_order": false
        }))
        .await;
        drain(ws).await;
    })
    .await;

    let mut controller = controller(url, Duration::from_secs(5));
    controller
        .submit(
            "Lease classification for Co A",
            &["Is this a finance lease?", "What discount rate applies?"],
        )
        .unwrap();

    assert_eq!(controller.run_to_end().await, SessionState::Completed);

    let request = request_rx.await.unwrap();
    assert_eq!(request["type"], "process_questions");
    assert_eq!(request["background"], "Lease classification for Co A");
    assert_eq!(request["questions"][1], "What discount rate applies?");
    assert_eq!(request["model"], "gpt-4o-mini");

    let answers = controller.ordered_answers();
    assert_eq!(answers.len(), 2);
    assert_eq!(answers[0].question_number, 1);
    assert_eq!(answers[0].answer, "Yes.");
    assert!(answers[0].received_at.is_some());
    assert_eq!(answers[1].question_number, 2);
    assert_eq!(controller.summary().unwrap().text, "## Finance lease");
    assert_eq!(controller.ordering_hint(), Some(false));

    controller.close();
    assert_eq!(controller.state(), SessionState::Completed);
}

#[tokio::test]
async fn test_abnormal_close_fails_session() {
    let url = spawn_server(|mut ws| async move {
        let _ = read_request(&mut ws).await;
        send_json(&mut ws, serde_json::json!({
            "type": "answer",
            "question_number": 1,
            "question": "Q1",
            "answer": "A1"
        }))
        .await;
        ws.close(Some(CloseFrame {
            code: CloseCode::Error,
            reason: "model unavailable".into(),
        }))
        .await
        .unwrap();
        drain(ws).await;
    })
    .await;

    let mut controller = controller(url, Duration::from_secs(5));
    controller.submit("ctx", &["Q1", "Q2"]).unwrap();

    assert_eq!(controller.run_to_end().await, SessionState::Failed);
    assert_eq!(
        controller.failure(),
        Some(&SessionError::AbnormalClosure {
            code: Some(1011),
            reason: "model unavailable".to_string(),
        })
    );
    assert_eq!(controller.ordered_answers().len(), 1);
    assert!(controller.pending_numbers().contains(&2));
}

#[tokio::test]
async fn test_refused_connection_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut controller = controller(format!("ws://{}/ws", addr), Duration::from_secs(5));
    controller.submit("ctx", &["Q1"]).unwrap();

    assert_eq!(controller.run_to_end().await, SessionState::Failed);
    assert!(matches!(controller.failure(), Some(SessionError::Transport(_))));
}

#[tokio::test]
async fn test_stalled_handshake_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // accept TCP but never answer the WebSocket upgrade
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(stream);
    });

    let mut controller = controller(format!("ws://{}/ws", addr), Duration::from_millis(200));
    controller.submit("ctx", &["Q1"]).unwrap();

    assert_eq!(controller.run_to_end().await, SessionState::Failed);
    assert_eq!(
        controller.failure(),
        Some(&SessionError::ConnectionTimeout(Duration::from_millis(200)))
    );

    server.abort();
}

#[tokio::test]
async fn test_malformed_frame_is_skipped() {
    let url = spawn_server(|mut ws| async move {
        let _ = read_request(&mut ws).await;
        ws.send(Message::Text("definitely not json".into())).await.unwrap();
        send_json(&mut ws, serde_json::json!({"type": "progress", "percent": 50})).await;
        send_json(&mut ws, serde_json::json!({
            "type": "answer",
            "question_number": 1,
            "question": "Q1",
            "answer": "A1"
        }))
        .await;
        send_json(&mut ws, serde_json::json!({"type": "summary", "summary": "done"})).await;
        drain(ws).await;
    })
    .await;

    let mut controller = controller(url, Duration::from_secs(5));
    controller.submit("ctx", &["Q1"]).unwrap();

    assert_eq!(controller.run_to_end().await, SessionState::Completed);
    assert_eq!(controller.ordered_answers().len(), 1);
    assert!(controller.failure().is_none());
}

#[tokio::test]
async fn test_binary_frames_require_utf8() {
    let url = spawn_server(|mut ws| async move {
        let _ = read_request(&mut ws).await;
        let mut invalid =
            br#"{"type":"answer","question_number":1,"question":"Q1","answer":"A"#.to_vec();
        invalid.extend_from_slice(b"\xff\"}");
        ws.send(Message::Binary(invalid.into())).await.unwrap();
        let valid = serde_json::json!({
            "type": "answer",
            "question_number": 2,
            "question": "Q2",
            "answer": "B"
        });
        ws.send(Message::Binary(valid.to_string().into_bytes().into()))
            .await
            .unwrap();
        send_json(&mut ws, serde_json::json!({"type": "summary", "summary": "done"})).await;
        drain(ws).await;
    })
    .await;

    let mut controller = controller(url, Duration::from_secs(5));
    controller.submit("ctx", &["Q1", "Q2"]).unwrap();

    let mut updates = Vec::new();
    while !controller.state().is_terminal() {
        match controller.next_update().await {
            Some(update) => updates.push(update),
            None => break,
        }
    }

    assert_eq!(controller.state(), SessionState::Completed);
    assert!(updates.iter().any(|update| matches!(
        update,
        SessionUpdate::Malformed { error } if error.contains("not valid UTF-8")
    )));
    let numbers: Vec<u32> = controller
        .ordered_answers()
        .iter()
        .map(|answer| answer.question_number)
        .collect();
    assert_eq!(numbers, vec![2]);
    assert!(controller.pending_numbers().contains(&1));
}

#[tokio::test]
async fn test_client_close_sends_neutral_reason() {
    let (reason_tx, reason_rx) = oneshot::channel();
    let url = spawn_server(|mut ws| async move {
        let _ = read_request(&mut ws).await;
        while let Some(Ok(message)) = ws.next().await {
            if let Message::Close(frame) = message {
                let _ = reason_tx.send(frame.map(|f| (u16::from(f.code), f.reason.as_str().to_owned())));
                break;
            }
        }
    })
    .await;

    let mut controller = controller(url, Duration::from_secs(5));
    controller.submit("ctx", &["Q1"]).unwrap();
    // opened, then request sent
    controller.next_update().await.unwrap();
    controller.close();

    let frame = tokio::time::timeout(Duration::from_secs(5), reason_rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(frame, Some((1000, "client closing".to_string())));
}
