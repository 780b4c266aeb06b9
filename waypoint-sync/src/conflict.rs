//! Conflict resolution between local and server versions of a resource

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SyncError;
use crate::event::SyncEvent;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    #[default]
    ServerWins,
    ClientWins,
    /// Higher `version` wins; ties and missing versions go to the server
    HighestVersion,
}

/// Which side of a conflict survives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    KeepLocal,
    AcceptRemote,
}

impl ConflictStrategy {
    pub fn resolve(&self, local: &SyncEvent, remote: &SyncEvent) -> Resolution {
        match self {
            ConflictStrategy::ServerWins => Resolution::AcceptRemote,
            ConflictStrategy::ClientWins => Resolution::KeepLocal,
            ConflictStrategy::HighestVersion => {
                if local.version.unwrap_or(0) > remote.version.unwrap_or(0) {
                    Resolution::KeepLocal
                } else {
                    Resolution::AcceptRemote
                }
            }
        }
    }
}

impl FromStr for ConflictStrategy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "server_wins" | "server" => Ok(ConflictStrategy::ServerWins),
            "client_wins" | "client" => Ok(ConflictStrategy::ClientWins),
            "highest_version" | "version" => Ok(ConflictStrategy::HighestVersion),
            other => Err(SyncError::InvalidConfig(format!(
                "unknown conflict strategy '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConflictStrategy::ServerWins => "server_wins",
            ConflictStrategy::ClientWins => "client_wins",
            ConflictStrategy::HighestVersion => "highest_version",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::SyncEventType;

    fn pair(local_version: Option<u64>, remote_version: Option<u64>) -> (SyncEvent, SyncEvent) {
        let mut local = SyncEvent::new(SyncEventType::Update, "career", "1");
        local.version = local_version;
        let mut remote = SyncEvent::new(SyncEventType::Conflict, "career", "1");
        remote.version = remote_version;
        (local, remote)
    }

    #[test]
    fn test_fixed_strategies() {
        let (local, remote) = pair(Some(9), Some(1));
        assert_eq!(
            ConflictStrategy::ServerWins.resolve(&local, &remote),
            Resolution::AcceptRemote
        );
        assert_eq!(
            ConflictStrategy::ClientWins.resolve(&local, &remote),
            Resolution::KeepLocal
        );
    }

    #[test]
    fn test_highest_version() {
        let strategy = ConflictStrategy::HighestVersion;

        let (local, remote) = pair(Some(5), Some(4));
        assert_eq!(strategy.resolve(&local, &remote), Resolution::KeepLocal);

        let (local, remote) = pair(Some(4), Some(4));
        assert_eq!(strategy.resolve(&local, &remote), Resolution::AcceptRemote);

        let (local, remote) = pair(None, Some(1));
        assert_eq!(strategy.resolve(&local, &remote), Resolution::AcceptRemote);
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            "highest_version".parse::<ConflictStrategy>().unwrap(),
            ConflictStrategy::HighestVersion
        );
        assert_eq!(
            "CLIENT_WINS".parse::<ConflictStrategy>().unwrap(),
            ConflictStrategy::ClientWins
        );
        assert!("last_write".parse::<ConflictStrategy>().is_err());
    }
}
