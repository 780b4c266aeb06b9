//! Realtime sync for Waypoint
//!
//! [`SyncClient`] keeps a WebSocket session to the sync endpoint, fans
//! incoming [`SyncEvent`]s out to subscribers and parks outgoing events in
//! a file-backed [`OfflineQueue`] while disconnected. Conflicts reported by
//! the server are settled with a [`ConflictStrategy`].

pub mod client;
pub mod config;
pub mod conflict;
pub mod error;
pub mod event;
pub mod offline;

pub use client::{ConnectionState, Delivery, SyncClient};
pub use config::SyncClientConfig;
pub use conflict::{ConflictStrategy, Resolution};
pub use error::{SyncError, SyncResult};
pub use event::{SyncEvent, SyncEventType};
pub use offline::OfflineQueue;
