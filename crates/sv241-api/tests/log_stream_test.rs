#![allow(clippy::unwrap_used)]
// Log stream reconnect behaviour against a local WebSocket server.

use std::time::Duration;

use futures_util::SinkExt;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use sv241_api::websocket::{LogStreamEvent, LogStreamHandle, ReconnectConfig};

async fn next_event(rx: &mut broadcast::Receiver<LogStreamEvent>) -> LogStreamEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for log stream event")
        .unwrap()
}

fn fast_reconnect() -> ReconnectConfig {
    ReconnectConfig {
        delay: Duration::from_millis(50),
    }
}

#[tokio::test]
async fn test_lines_and_reconnect_after_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        for round in 0..2 {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(Message::Text(format!("[INFO] line {round}").into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        }
    });

    let cancel = CancellationToken::new();
    let url = Url::parse(&format!("ws://{addr}/ws/logs")).unwrap();
    let mut rx = LogStreamHandle::spawn(url, fast_reconnect(), cancel.clone()).into_receiver();

    assert_eq!(next_event(&mut rx).await, LogStreamEvent::Connected);
    assert_eq!(
        next_event(&mut rx).await,
        LogStreamEvent::Line("[INFO] line 0".into())
    );
    assert_eq!(
        next_event(&mut rx).await,
        LogStreamEvent::Disconnected { reason: None }
    );

    // The loop comes back on its own after the fixed delay.
    assert_eq!(next_event(&mut rx).await, LogStreamEvent::Connected);
    assert_eq!(
        next_event(&mut rx).await,
        LogStreamEvent::Line("[INFO] line 1".into())
    );

    cancel.cancel();
}

#[tokio::test]
async fn test_failed_connect_reports_disconnect_and_retries() {
    // Grab a free port and release it so nothing is listening there.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let cancel = CancellationToken::new();
    let url = Url::parse(&format!("ws://{addr}/ws/logs")).unwrap();
    let mut rx = LogStreamHandle::spawn(url, fast_reconnect(), cancel.clone()).into_receiver();

    for _ in 0..2 {
        match next_event(&mut rx).await {
            LogStreamEvent::Disconnected { reason } => assert!(reason.is_some()),
            other => panic!("expected Disconnected, got {other:?}"),
        }
    }

    cancel.cancel();
}

#[tokio::test]
async fn test_cancel_stops_loop() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let cancel = CancellationToken::new();
    let url = Url::parse(&format!("ws://{addr}/ws/logs")).unwrap();
    let handle = LogStreamHandle::spawn(url, fast_reconnect(), cancel.clone());
    let mut rx = handle.subscribe();
    handle.shutdown();

    // Once the loop exits the sender is dropped and the channel closes.
    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Err(broadcast::error::RecvError::Closed) => break true,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            }
        }
    })
    .await
    .unwrap();
    assert!(closed);
    assert!(cancel.is_cancelled());
}
