//! Realtime sync configuration

use crate::error::ConfigResult;
use crate::validation::{validate_enum_choice, validate_positive, validate_url_scheme, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// WebSocket endpoint
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    /// Initial reconnect delay, doubled on each failed attempt
    #[serde(
        with = "crate::domains::utils::serde_duration_ms",
        default = "default_reconnect_delay"
    )]
    pub reconnect_delay_ms: Duration,

    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// File backing the offline queue; in-memory only when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offline_queue_path: Option<String>,

    #[serde(default = "default_max_offline_events")]
    pub max_offline_events: usize,

    /// server_wins, client_wins or highest_version
    #[serde(default = "default_conflict_strategy")]
    pub conflict_strategy: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            reconnect_delay_ms: default_reconnect_delay(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            offline_queue_path: None,
            max_offline_events: default_max_offline_events(),
            conflict_strategy: default_conflict_strategy(),
        }
    }
}

impl Validatable for SyncConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_url_scheme(&self.ws_url, &["ws", "wss"], "ws_url", self.domain_name())?;
        validate_positive(self.max_offline_events, "max_offline_events", self.domain_name())?;
        validate_enum_choice(
            &self.conflict_strategy,
            &["server_wins", "client_wins", "highest_version"],
            "conflict_strategy",
            self.domain_name(),
        )?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "sync"
    }
}

fn default_ws_url() -> String {
    "ws://localhost:3000/ws".to_string()
}

fn default_reconnect_delay() -> Duration {
    Duration::from_millis(1000)
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_max_offline_events() -> usize {
    1000
}

fn default_conflict_strategy() -> String {
    "server_wins".to_string()
}
