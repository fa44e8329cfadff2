// Wire protocol between the sync daemon and connected sessions.
//
// Events travel over a long-lived SSE connection as a named event plus a
// JSON data payload. Full-document pushes use `snapshot_update`, queued
// editor operations use `edit`, and control signals (refresh, delete,
// force-refresh) share the `update` event name with an `action` field,
// matching what automation scripts already emit.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{ProjectId, Snapshot};

pub const EVENT_SNAPSHOT_UPDATE: &str = "snapshot_update";
pub const EVENT_EDIT: &str = "edit";
pub const EVENT_UPDATE: &str = "update";
pub const EVENT_CONNECTED: &str = "connected";

/// One event on the broadcast channel.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Full document replace.
    SnapshotUpdate(Box<Snapshot>),
    /// A single queued editor operation.
    Edit(PendingEdit),
    /// Re-fetch the project list; optionally focus a project.
    RefreshProjects { project_id: Option<ProjectId> },
    /// A project was removed; sessions bound to it must detach.
    ProjectDeleted { project_id: ProjectId, redirect_to: Option<String> },
    /// Full client reload requested.
    ForceRefresh { timestamp: i64 },
}

impl SyncEvent {
    /// SSE event name for this event.
    pub fn event_name(&self) -> &'static str {
        match self {
            SyncEvent::SnapshotUpdate(_) => EVENT_SNAPSHOT_UPDATE,
            SyncEvent::Edit(_) => EVENT_EDIT,
            SyncEvent::RefreshProjects { .. }
            | SyncEvent::ProjectDeleted { .. }
            | SyncEvent::ForceRefresh { .. } => EVENT_UPDATE,
        }
    }

    /// JSON data payload for this event.
    pub fn payload(&self) -> Result<Value, ProtocolError> {
        let value = match self {
            SyncEvent::SnapshotUpdate(snapshot) => serde_json::to_value(snapshot.as_ref())?,
            SyncEvent::Edit(edit) => serde_json::to_value(edit)?,
            SyncEvent::RefreshProjects { project_id } => {
                let mut body = json!({ "action": "refreshProjects" });
                if let Some(id) = project_id {
                    body["projectId"] = json!(id);
                }
                body
            }
            SyncEvent::ProjectDeleted { project_id, redirect_to } => json!({
                "action": "projectDeleted",
                "deletedProjectId": project_id,
                "redirectTo": redirect_to,
            }),
            SyncEvent::ForceRefresh { timestamp } => json!({
                "action": "forceRefresh",
                "timestamp": timestamp,
            }),
        };
        Ok(value)
    }

    /// Decode an event from its SSE name and data payload.
    pub fn parse(event_name: &str, data: &str) -> Result<Self, ProtocolError> {
        match event_name {
            EVENT_SNAPSHOT_UPDATE => {
                let snapshot: Snapshot = serde_json::from_str(data)?;
                Ok(SyncEvent::SnapshotUpdate(Box::new(snapshot)))
            }
            EVENT_EDIT => Ok(SyncEvent::Edit(serde_json::from_str(data)?)),
            EVENT_UPDATE => {
                let value: Value = serde_json::from_str(data)?;
                let action = value
                    .get("action")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ProtocolError::UnknownAction(String::new()))?;
                match action {
                    "refreshProjects" => Ok(SyncEvent::RefreshProjects {
                        project_id: value
                            .get("projectId")
                            .and_then(Value::as_str)
                            .map(ProjectId::from),
                    }),
                    "projectDeleted" => {
                        let project_id = value
                            .get("deletedProjectId")
                            .and_then(Value::as_str)
                            .ok_or_else(|| ProtocolError::UnknownAction(action.to_string()))?;
                        Ok(SyncEvent::ProjectDeleted {
                            project_id: ProjectId::from(project_id),
                            redirect_to: value
                                .get("redirectTo")
                                .and_then(Value::as_str)
                                .map(str::to_string),
                        })
                    }
                    "forceRefresh" => Ok(SyncEvent::ForceRefresh {
                        timestamp: value
                            .get("timestamp")
                            .and_then(Value::as_i64)
                            .unwrap_or_default(),
                    }),
                    other => Err(ProtocolError::UnknownAction(other.to_string())),
                }
            }
            other => Err(ProtocolError::UnknownEvent(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed event payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("unknown event `{0}`")]
    UnknownEvent(String),
    #[error("unknown control action `{0}`")]
    UnknownAction(String),
}

/// A queued editor operation from external automation, applied client-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEdit {
    pub id: String,
    pub action: String,
    #[serde(default)]
    pub data: Value,
    /// Milliseconds since the epoch.
    pub timestamp: i64,
    #[serde(default)]
    pub processed: bool,
}

impl PendingEdit {
    pub fn new(action: impl Into<String>, data: Value) -> Self {
        Self {
            id: format!("edit_{}", Uuid::new_v4().simple()),
            action: action.into(),
            data,
            timestamp: Utc::now().timestamp_millis(),
            processed: false,
        }
    }
}

/// Envelope for `POST /api/edit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub action: String,
    #[serde(default)]
    pub data: Value,
}

/// Uniform response envelope for the ingest and query APIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl ApiResponse {
    pub fn ok() -> Self {
        Self { success: true, message: None, error: None, body: Map::new() }
    }

    pub fn ok_with_message(message: impl Into<String>) -> Self {
        Self { message: Some(message.into()), ..Self::ok() }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self { success: false, message: None, error: Some(error.into()), body: Map::new() }
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.body.insert(key.into(), value);
        self
    }
}

/// One row in the `listProjects` result, deduplicated by internal id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectEntry {
    pub id: ProjectId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<chrono::DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<chrono::DateTime<Utc>>,
    pub folder_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Snapshot;

    #[test]
    fn snapshot_update_round_trip() {
        let snapshot = Snapshot::default_for(ProjectId::new("p1"), Utc::now());
        let event = SyncEvent::SnapshotUpdate(Box::new(snapshot));
        assert_eq!(event.event_name(), "snapshot_update");

        let payload = event.payload().unwrap().to_string();
        let parsed = SyncEvent::parse("snapshot_update", &payload).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn control_events_share_the_update_name() {
        let event = SyncEvent::ProjectDeleted {
            project_id: ProjectId::new("p2"),
            redirect_to: Some("/projects".to_string()),
        };
        assert_eq!(event.event_name(), "update");

        let payload = event.payload().unwrap();
        assert_eq!(payload["action"], "projectDeleted");
        assert_eq!(payload["deletedProjectId"], "p2");

        let parsed = SyncEvent::parse("update", &payload.to_string()).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn refresh_projects_optional_focus() {
        let bare = SyncEvent::RefreshProjects { project_id: None };
        let payload = bare.payload().unwrap();
        assert!(payload.get("projectId").is_none());
        assert_eq!(SyncEvent::parse("update", &payload.to_string()).unwrap(), bare);

        let focused = SyncEvent::RefreshProjects { project_id: Some(ProjectId::new("p3")) };
        let payload = focused.payload().unwrap();
        assert_eq!(SyncEvent::parse("update", &payload.to_string()).unwrap(), focused);
    }

    #[test]
    fn unknown_event_and_action_are_errors() {
        assert!(matches!(
            SyncEvent::parse("bogus", "{}"),
            Err(ProtocolError::UnknownEvent(_))
        ));
        assert!(matches!(
            SyncEvent::parse("update", r#"{"action":"bogus"}"#),
            Err(ProtocolError::UnknownAction(_))
        ));
        assert!(matches!(
            SyncEvent::parse("snapshot_update", "not json"),
            Err(ProtocolError::Payload(_))
        ));
    }

    #[test]
    fn pending_edit_ids_are_unique() {
        let a = PendingEdit::new("addSubtitle", serde_json::json!({"text": "hi"}));
        let b = PendingEdit::new("addSubtitle", serde_json::json!({"text": "hi"}));
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("edit_"));
        assert!(!a.processed);
    }

    #[test]
    fn api_response_envelope_shape() {
        let response = ApiResponse::ok_with_message("archived")
            .with("projectId", serde_json::json!("p1"));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["message"], "archived");
        assert_eq!(value["projectId"], "p1");
        assert!(value.get("error").is_none());
    }
}
