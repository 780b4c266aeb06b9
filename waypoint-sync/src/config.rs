//! Runtime sync configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::conflict::ConflictStrategy;
use crate::error::{SyncError, SyncResult};

#[derive(Debug, Clone)]
pub struct SyncClientConfig {
    pub ws_url: String,
    /// First reconnect delay, doubled per failed attempt
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
    pub offline_queue_path: Option<PathBuf>,
    pub max_offline_events: usize,
    pub conflict_strategy: ConflictStrategy,
}

impl Default for SyncClientConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://localhost:3000/ws".to_string(),
            reconnect_delay: Duration::from_millis(1000),
            max_reconnect_attempts: 5,
            offline_queue_path: None,
            max_offline_events: 1000,
            conflict_strategy: ConflictStrategy::ServerWins,
        }
    }
}

impl TryFrom<&waypoint_config::SyncConfig> for SyncClientConfig {
    type Error = SyncError;

    fn try_from(config: &waypoint_config::SyncConfig) -> SyncResult<Self> {
        Ok(Self {
            ws_url: config.ws_url.clone(),
            reconnect_delay: config.reconnect_delay_ms,
            max_reconnect_attempts: config.max_reconnect_attempts,
            offline_queue_path: config.offline_queue_path.as_ref().map(PathBuf::from),
            max_offline_events: config.max_offline_events,
            conflict_strategy: config.conflict_strategy.parse()?,
        })
    }
}

impl SyncClientConfig {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            ..Default::default()
        }
    }

    pub fn with_offline_queue(mut self, path: impl Into<PathBuf>) -> Self {
        self.offline_queue_path = Some(path.into());
        self
    }

    pub fn with_reconnect(mut self, delay: Duration, max_attempts: u32) -> Self {
        self.reconnect_delay = delay;
        self.max_reconnect_attempts = max_attempts;
        self
    }

    pub fn with_conflict_strategy(mut self, strategy: ConflictStrategy) -> Self {
        self.conflict_strategy = strategy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_domain_config() {
        let domain = waypoint_config::SyncConfig {
            offline_queue_path: Some("/tmp/waypoint-offline.json".to_string()),
            conflict_strategy: "highest_version".to_string(),
            ..Default::default()
        };
        let config = SyncClientConfig::try_from(&domain).unwrap();
        assert_eq!(config.conflict_strategy, ConflictStrategy::HighestVersion);
        assert_eq!(
            config.offline_queue_path,
            Some(PathBuf::from("/tmp/waypoint-offline.json"))
        );
        assert_eq!(config.max_reconnect_attempts, 5);
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let domain = waypoint_config::SyncConfig {
            conflict_strategy: "newest".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            SyncClientConfig::try_from(&domain),
            Err(SyncError::InvalidConfig(_))
        ));
    }
}
