use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use waypoint_sync::{
    ConnectionState, Delivery, OfflineQueue, SyncClient, SyncClientConfig, SyncEvent,
    SyncEventType,
};

const WAIT: Duration = Duration::from_secs(5);

/// Single-connection WebSocket server: frames the client sends arrive on the
/// returned receiver, strings pushed into the sender go to the client.
async fn spawn_server() -> (String, mpsc::UnboundedReceiver<SyncEvent>, mpsc::UnboundedSender<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());
    let (received_tx, received_rx) = mpsc::unbounded_channel();
    let (push_tx, mut push_rx) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let socket = tokio_tungstenite::accept_async(stream).await.unwrap();
        let (mut sink, mut source) = socket.split();
        loop {
            tokio::select! {
                Some(text) = push_rx.recv() => {
                    sink.send(Message::Text(text)).await.unwrap();
                }
                frame = source.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        let _ = received_tx.send(SyncEvent::from_json(&text).unwrap());
                    }
                    Some(Ok(_)) => {}
                    _ => break,
                },
            }
        }
    });

    (url, received_rx, push_tx)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<SyncEvent>) -> SyncEvent {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for server frame")
        .expect("server closed")
}

#[tokio::test]
async fn test_events_flow_both_ways() {
    let (url, mut received, push) = spawn_server().await;
    let client = SyncClient::new(SyncClientConfig::new(url)).await.unwrap();
    let mut subscriber = client.subscribe();
    assert!(!client.is_connected());

    client.connect().unwrap();
    assert!(client.wait_for_state(ConnectionState::Connected, WAIT).await);
    assert!(client.is_connected());

    let outgoing = SyncEvent::new(SyncEventType::Update, "subject", "3").with_version(2);
    assert_eq!(client.send(outgoing.clone()).await.unwrap(), Delivery::Sent);
    assert_eq!(next_event(&mut received).await.id, outgoing.id);

    let incoming = SyncEvent::new(SyncEventType::Create, "career", "11").with_user("admin");
    push.send(incoming.to_json().unwrap()).unwrap();
    let seen = tokio::time::timeout(WAIT, subscriber.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seen, incoming);

    client.disconnect().await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_offline_queue_flushed_in_order_on_connect() {
    let dir = TempDir::new().unwrap();
    let queue_path = dir.path().join("sync-offline.json");
    let (url, mut received, _push) = spawn_server().await;

    let config = SyncClientConfig::new(url).with_offline_queue(&queue_path);
    let client = SyncClient::new(config).await.unwrap();

    let first = SyncEvent::new(SyncEventType::Create, "subject", "1");
    let second = SyncEvent::new(SyncEventType::Delete, "subject", "2");
    assert_eq!(client.send(first.clone()).await.unwrap(), Delivery::Queued);
    assert_eq!(client.send(second.clone()).await.unwrap(), Delivery::Queued);
    assert_eq!(OfflineQueue::load(&queue_path, 100).await.unwrap().len(), 2);

    client.connect().unwrap();
    assert_eq!(next_event(&mut received).await.id, first.id);
    assert_eq!(next_event(&mut received).await.id, second.id);

    assert!(client.wait_for_state(ConnectionState::Connected, WAIT).await);
    assert_eq!(client.offline_len().await, 0);
    assert!(OfflineQueue::load(&queue_path, 100).await.unwrap().is_empty());

    client.disconnect().await;
}

#[tokio::test]
async fn test_gives_up_after_max_reconnect_attempts() {
    // reserve a port, then free it so nothing is listening
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());
    drop(listener);

    let config = SyncClientConfig::new(url).with_reconnect(Duration::from_millis(10), 2);
    let client = SyncClient::new(config).await.unwrap();
    let mut subscriber = client.subscribe();

    client.connect().unwrap();
    assert!(client.wait_for_state(ConnectionState::Failed, WAIT).await);

    let notice = tokio::time::timeout(WAIT, subscriber.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(notice.event_type, SyncEventType::Error);

    let event = SyncEvent::new(SyncEventType::Update, "career", "5");
    assert_eq!(client.send(event).await.unwrap(), Delivery::Queued);
}
