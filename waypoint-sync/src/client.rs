//! WebSocket sync client
//!
//! One background task owns the socket. It flushes the offline queue on
//! every (re)connect, forwards outgoing events from [`SyncClient::send`],
//! broadcasts incoming events, and reconnects with exponential backoff until
//! `max_reconnect_attempts` consecutive attempts have failed.

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use waypoint_resilience::{BackoffCalculator, BackoffStrategy};

use crate::config::SyncClientConfig;
use crate::conflict::Resolution;
use crate::error::{SyncError, SyncResult};
use crate::event::{SyncEvent, SyncEventType};
use crate::offline::OfflineQueue;

/// Events buffered per subscriber before it starts lagging
const EVENT_BUFFER_SIZE: usize = 256;

/// Upper bound for a single reconnect delay
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    /// Reconnect attempts exhausted
    Failed,
}

/// How [`SyncClient::send`] handled an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Queued,
}

/// Realtime sync client
///
/// Cheap to clone; clones share the connection, subscribers and queue.
#[derive(Clone)]
pub struct SyncClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: SyncClientConfig,
    state: watch::Sender<ConnectionState>,
    shutdown: watch::Sender<bool>,
    events: broadcast::Sender<SyncEvent>,
    outbound: Mutex<Option<mpsc::UnboundedSender<SyncEvent>>>,
    offline: tokio::sync::Mutex<OfflineQueue>,
    /// Latest local mutation per resource, kept for conflict resolution
    pending: Mutex<HashMap<(String, String), SyncEvent>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for SyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("ws_url", &self.inner.config.ws_url)
            .field("state", &self.state())
            .finish()
    }
}

impl SyncClient {
    /// Create a client, loading the offline queue from disk when configured
    pub async fn new(config: SyncClientConfig) -> SyncResult<Self> {
        let offline = match &config.offline_queue_path {
            Some(path) => OfflineQueue::load(path, config.max_offline_events).await?,
            None => OfflineQueue::in_memory(config.max_offline_events),
        };
        if !offline.is_empty() {
            info!("{} offline sync events waiting for a connection", offline.len());
        }

        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (shutdown, _) = watch::channel(false);
        let (events, _) = broadcast::channel(EVENT_BUFFER_SIZE);

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                state,
                shutdown,
                events,
                outbound: Mutex::new(None),
                offline: tokio::sync::Mutex::new(offline),
                pending: Mutex::new(HashMap::new()),
                task: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &SyncClientConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Receive every event the server pushes, after conflict resolution
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    pub async fn offline_len(&self) -> usize {
        self.inner.offline.lock().await.len()
    }

    /// Start the connection task; returns without waiting for the handshake
    pub fn connect(&self) -> SyncResult<()> {
        let mut task = self.inner.task.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Err(SyncError::AlreadyRunning);
        }

        self.inner.shutdown.send_replace(false);
        let inner = self.inner.clone();
        *task = Some(tokio::spawn(async move { inner.run().await }));
        Ok(())
    }

    /// Wait until the connection reaches `target`, up to `timeout`
    pub async fn wait_for_state(&self, target: ConnectionState, timeout: Duration) -> bool {
        let mut changes = self.state_changes();
        tokio::time::timeout(timeout, async {
            loop {
                if *changes.borrow_and_update() == target {
                    return true;
                }
                if changes.changed().await.is_err() {
                    return false;
                }
            }
        })
        .await
        .unwrap_or(false)
    }

    /// Send an event, or queue it offline when there is no live connection.
    ///
    /// Only persistence failures of the offline queue are errors.
    pub async fn send(&self, event: SyncEvent) -> SyncResult<Delivery> {
        if event.is_mutation() {
            self.inner
                .pending
                .lock()
                .insert(event.resource_key(), event.clone());
        }

        // Holding the queue lock orders this send after any in-progress flush
        let mut offline = self.inner.offline.lock().await;
        let live = self.inner.outbound.lock().clone();
        if let Some(tx) = live {
            if tx.send(event.clone()).is_ok() {
                return Ok(Delivery::Sent);
            }
        }

        debug!("Sync offline; queueing {} {}", event.event_type, event.id);
        offline.push(event).await?;
        Ok(Delivery::Queued)
    }

    /// Close the connection and stop reconnecting
    pub async fn disconnect(&self) {
        self.inner.shutdown.send_replace(true);
        let handle = self.inner.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Sync task ended abnormally: {}", e);
            }
        }
        self.inner.set_state(ConnectionState::Disconnected);
    }
}

impl Inner {
    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn broadcast(&self, event: SyncEvent) {
        match self.events.send(event) {
            Ok(subscribers) => debug!("Broadcasted sync event to {} subscribers", subscribers),
            Err(_) => debug!("No subscribers for sync events"),
        }
    }

    async fn run(self: Arc<Self>) {
        let backoff = BackoffCalculator::new(
            BackoffStrategy::Exponential { base: 2.0 },
            self.config.reconnect_delay,
            MAX_RECONNECT_DELAY,
            0.0,
        );
        let mut shutdown = self.shutdown.subscribe();
        let mut failures: u32 = 0;

        loop {
            if self.is_shutting_down() {
                break;
            }
            if failures == 0 {
                self.set_state(ConnectionState::Connecting);
            }

            match connect_async(self.config.ws_url.as_str()).await {
                Ok((socket, _)) => {
                    info!("Sync connected to {}", self.config.ws_url);
                    failures = 0;
                    if self.session(socket).await {
                        break;
                    }
                    warn!("Sync connection to {} lost", self.config.ws_url);
                }
                Err(e) => warn!("Sync connection to {} failed: {}", self.config.ws_url, e),
            }

            if self.is_shutting_down() {
                break;
            }

            failures += 1;
            if failures > self.config.max_reconnect_attempts {
                let err = SyncError::ReconnectExhausted {
                    attempts: self.config.max_reconnect_attempts,
                };
                error!("{}", err);
                self.set_state(ConnectionState::Failed);
                self.broadcast(
                    SyncEvent::new(SyncEventType::Error, "connection", &self.config.ws_url)
                        .with_data(json!({ "error": err.to_string() })),
                );
                return;
            }

            let delay = backoff.calculate_delay(failures);
            self.set_state(ConnectionState::Reconnecting { attempt: failures });
            debug!("Reconnecting in {:?} (attempt {})", delay, failures);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => {}
            }
        }

        self.set_state(ConnectionState::Disconnected);
    }

    /// Drive one connected socket. Returns true when closed on request.
    async fn session(&self, socket: Socket) -> bool {
        let (mut sink, mut source) = socket.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<SyncEvent>();
        let mut shutdown = self.shutdown.subscribe();

        {
            let mut offline = self.offline.lock().await;
            let queued = match offline.drain().await {
                Ok(queued) => queued,
                Err(e) => {
                    // Events stay queued for the next connection
                    warn!("Failed to drain offline queue: {}", e);
                    return false;
                }
            };
            if !queued.is_empty() {
                info!("Flushing {} offline sync events", queued.len());
            }

            for (i, event) in queued.iter().enumerate() {
                if let Err(e) = send_event(&mut sink, event).await {
                    warn!("Offline flush interrupted: {}", e);
                    if let Err(e) = offline.requeue_front(queued[i..].to_vec()).await {
                        error!("Failed to requeue offline events: {}", e);
                    }
                    return false;
                }
            }

            *self.outbound.lock() = Some(tx.clone());
            self.set_state(ConnectionState::Connected);
        }

        let requested = loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    let _ = sink.send(Message::Close(None)).await;
                    break true;
                }
                Some(event) = rx.recv() => {
                    if let Err(e) = send_event(&mut sink, &event).await {
                        warn!("Sync send failed: {}", e);
                        self.park(event).await;
                        break false;
                    }
                }
                incoming = source.next() => match incoming {
                    Some(Ok(Message::Text(text))) => self.handle_incoming(&text, &tx),
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = sink.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break false,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Sync socket error: {}", e);
                        break false;
                    }
                },
            }
        };

        *self.outbound.lock() = None;
        rx.close();
        while let Ok(event) = rx.try_recv() {
            self.park(event).await;
        }
        requested
    }

    async fn park(&self, event: SyncEvent) {
        if let Err(e) = self.offline.lock().await.push(event).await {
            error!("Failed to queue sync event offline: {}", e);
        }
    }

    fn handle_incoming(&self, text: &str, outbound: &mpsc::UnboundedSender<SyncEvent>) {
        let event = match SyncEvent::from_json(text) {
            Ok(event) => event,
            Err(e) => {
                warn!("Ignoring malformed sync message: {}", e);
                return;
            }
        };

        if event.event_type == SyncEventType::Conflict {
            self.resolve_conflict(event, outbound);
            return;
        }

        {
            let mut pending = self.pending.lock();
            let key = event.resource_key();
            if pending.get(&key).is_some_and(|local| local.id == event.id) {
                pending.remove(&key);
            }
        }
        self.broadcast(event);
    }

    /// Settle a server-reported conflict against the latest local mutation.
    ///
    /// The surviving state is broadcast as an `update`. A local win is sent
    /// again with a version above the server's.
    fn resolve_conflict(&self, remote: SyncEvent, outbound: &mpsc::UnboundedSender<SyncEvent>) {
        let key = remote.resource_key();
        let local = self.pending.lock().get(&key).cloned();

        let Some(local) = local else {
            debug!("Conflict on {}/{} with no local change", remote.resource, remote.resource_id);
            self.broadcast(remote);
            return;
        };

        match self.config.conflict_strategy.resolve(&local, &remote) {
            Resolution::AcceptRemote => {
                info!(
                    "Conflict on {}/{}: server version kept ({})",
                    remote.resource, remote.resource_id, self.config.conflict_strategy
                );
                self.pending.lock().remove(&key);
                let mut settled = remote;
                settled.event_type = SyncEventType::Update;
                self.broadcast(settled);
            }
            Resolution::KeepLocal => {
                info!(
                    "Conflict on {}/{}: local version kept ({})",
                    remote.resource, remote.resource_id, self.config.conflict_strategy
                );
                let mut retry = local.clone();
                retry.id = Uuid::new_v4().to_string();
                retry.timestamp = Utc::now();
                retry.version = Some(remote.version.unwrap_or(0).max(local.version.unwrap_or(0)) + 1);
                if retry.event_type == SyncEventType::Create {
                    retry.event_type = SyncEventType::Update;
                }
                self.pending.lock().insert(key, retry.clone());

                if outbound.send(retry.clone()).is_err() {
                    warn!("Connection closed before conflict resend of {}", retry.id);
                }

                let mut settled = retry;
                if settled.event_type != SyncEventType::Delete {
                    settled.event_type = SyncEventType::Update;
                }
                self.broadcast(settled);
            }
        }
    }
}

async fn send_event<S>(sink: &mut S, event: &SyncEvent) -> SyncResult<()>
where
    S: futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let text = event.to_json()?;
    sink.send(Message::Text(text)).await?;
    Ok(())
}
