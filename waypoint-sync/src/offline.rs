//! File-backed queue of events produced while disconnected

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::SyncResult;
use crate::event::SyncEvent;

/// Ordered, size-capped queue persisted as a JSON array
///
/// Without a path the queue lives in memory only. When full, the oldest
/// event is dropped to make room.
#[derive(Debug)]
pub struct OfflineQueue {
    path: Option<PathBuf>,
    events: VecDeque<SyncEvent>,
    max_events: usize,
}

impl OfflineQueue {
    pub fn in_memory(max_events: usize) -> Self {
        Self {
            path: None,
            events: VecDeque::new(),
            max_events: max_events.max(1),
        }
    }

    /// Open the queue at `path`, loading any events a previous run left.
    ///
    /// A missing file is an empty queue.
    pub async fn load(path: impl Into<PathBuf>, max_events: usize) -> SyncResult<Self> {
        let path = path.into();
        let mut queue = Self {
            path: Some(path.clone()),
            events: VecDeque::new(),
            max_events: max_events.max(1),
        };

        match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => {}
            Ok(bytes) => {
                let events: Vec<SyncEvent> = serde_json::from_slice(&bytes)?;
                debug!("Loaded {} offline events from {}", events.len(), path.display());
                queue.events = events.into();
                queue.enforce_cap();
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        Ok(queue)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn max_events(&self) -> usize {
        self.max_events
    }

    pub fn iter(&self) -> impl Iterator<Item = &SyncEvent> {
        self.events.iter()
    }

    /// Append an event; returns the event evicted to stay within the cap.
    ///
    /// On a failed write the queue is left as it was.
    pub async fn push(&mut self, event: SyncEvent) -> SyncResult<Option<SyncEvent>> {
        self.events.push_back(event);
        let dropped = self.enforce_cap();
        if let Err(e) = self.persist().await {
            self.events.pop_back();
            for event in dropped.into_iter().rev() {
                self.events.push_front(event);
            }
            return Err(e);
        }
        Ok(dropped.into_iter().next())
    }

    /// Remove every event, oldest first.
    ///
    /// Events stay queued unless the emptied queue was written.
    pub async fn drain(&mut self) -> SyncResult<Vec<SyncEvent>> {
        self.write(&[]).await?;
        Ok(self.events.drain(..).collect())
    }

    /// Put undelivered events back ahead of anything queued since
    pub async fn requeue_front(&mut self, events: Vec<SyncEvent>) -> SyncResult<()> {
        for event in events.into_iter().rev() {
            self.events.push_front(event);
        }
        self.enforce_cap();
        self.persist().await
    }

    fn enforce_cap(&mut self) -> Vec<SyncEvent> {
        let mut dropped = Vec::new();
        while self.events.len() > self.max_events {
            if let Some(event) = self.events.pop_front() {
                warn!(
                    "Offline queue full ({}); dropping oldest event {}",
                    self.max_events, event.id
                );
                dropped.push(event);
            }
        }
        dropped
    }

    async fn persist(&self) -> SyncResult<()> {
        let events: Vec<&SyncEvent> = self.events.iter().collect();
        self.write(&events).await
    }

    async fn write(&self, events: &[&SyncEvent]) -> SyncResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let bytes = serde_json::to_vec(events)?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}
