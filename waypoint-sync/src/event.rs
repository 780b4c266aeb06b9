//! Sync event envelope

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncEventType {
    Create,
    Update,
    Delete,
    Sync,
    Conflict,
    Error,
}

impl fmt::Display for SyncEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncEventType::Create => "create",
            SyncEventType::Update => "update",
            SyncEventType::Delete => "delete",
            SyncEventType::Sync => "sync",
            SyncEventType::Conflict => "conflict",
            SyncEventType::Error => "error",
        };
        f.write_str(name)
    }
}

/// One change to a resource, as exchanged with the sync server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: SyncEventType,
    pub resource: String,
    pub resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

impl SyncEvent {
    pub fn new(
        event_type: SyncEventType,
        resource: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type,
            resource: resource.into(),
            resource_id: resource_id.into(),
            data: None,
            timestamp: Utc::now(),
            user_id: None,
            version: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }

    /// `(resource, resource_id)`, the identity conflicts are matched on
    pub fn resource_key(&self) -> (String, String) {
        (self.resource.clone(), self.resource_id.clone())
    }

    /// Whether this event changes a resource
    pub fn is_mutation(&self) -> bool {
        matches!(
            self.event_type,
            SyncEventType::Create | SyncEventType::Update | SyncEventType::Delete
        )
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_format_uses_camel_case() {
        let event = SyncEvent::new(SyncEventType::Update, "career", "42")
            .with_data(json!({"title": "Nurse"}))
            .with_user("user-7")
            .with_version(3);

        let wire: Value = serde_json::to_value(&event).unwrap();
        assert_eq!(wire["type"], "update");
        assert_eq!(wire["resourceId"], "42");
        assert_eq!(wire["userId"], "user-7");
        assert_eq!(wire["version"], 3);
        assert!(wire.get("resource_id").is_none());
    }

    #[test]
    fn test_optional_fields_may_be_absent() {
        let event = SyncEvent::from_json(
            r#"{"id":"e1","type":"delete","resource":"subject","resourceId":"9","timestamp":"2024-03-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(event.event_type, SyncEventType::Delete);
        assert!(event.data.is_none());
        assert!(event.version.is_none());
        assert!(event.is_mutation());
    }
}
