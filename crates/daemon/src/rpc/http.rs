// Query and ingest handlers.
//
// Everything rides one endpoint with an `action` discriminator so
// automation scripts need a single URL: GET for reads, POST for writes and
// queued edits. Responses use the uniform `ApiResponse` envelope.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use cutsync_common::protocol::{ApiResponse, IngestRequest};

use crate::runtime::{DeleteOutcome, SyncState};
use crate::store::archive::ArchiveOutcome;

/// Edit actions accepted into the pending queue for client-side application.
const QUEUEABLE_ACTIONS: &[&str] = &[
    "addText",
    "addSubtitle",
    "addMultipleSubtitles",
    "clearSubtitles",
    "removeElement",
    "updateElement",
    "splitElement",
    "moveElement",
    "addMarkers",
    "setFullState",
];

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    pub action: Option<String>,
    pub project: Option<String>,
}

pub async fn query(
    State(state): State<Arc<SyncState>>,
    Query(params): Query<QueryParams>,
) -> (StatusCode, Json<ApiResponse>) {
    match params.action.as_deref().unwrap_or("getSnapshot") {
        "getSnapshot" => {
            let document = match params.project.as_deref() {
                Some(project) => state
                    .load_project(project)
                    .and_then(|r| serde_json::to_value(r.snapshot).ok()),
                None => state.current_document(),
            };
            match document {
                Some(document) => ok(ApiResponse::ok().with("snapshot", document)),
                None => not_found("no snapshot available"),
            }
        }
        "listProjects" => match serde_json::to_value(state.list_projects()) {
            Ok(projects) => ok(ApiResponse::ok().with("projects", projects)),
            Err(error) => internal_error(error.into()),
        },
        "getPendingEdits" | "poll" => {
            match serde_json::to_value(state.pending.unprocessed()) {
                Ok(edits) => ok(ApiResponse::ok().with("edits", edits)),
                Err(error) => internal_error(error.into()),
            }
        }
        other => bad_request(format!("unknown query action `{other}`")),
    }
}

pub async fn ingest(
    State(state): State<Arc<SyncState>>,
    Json(request): Json<IngestRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let IngestRequest { action, data } = request;
    match action.as_str() {
        "updateSnapshot" => match state.update_snapshot(data).await {
            Ok(_) => ok(ApiResponse::ok_with_message("snapshot updated")),
            Err(error) => internal_error(error),
        },
        "saveSnapshot" => match state.save_snapshot(data).await {
            Ok(_) => ok(ApiResponse::ok_with_message("snapshot saved")),
            Err(error) => internal_error(error),
        },
        "archiveProject" => {
            let immediate = data.get("immediate").and_then(Value::as_bool).unwrap_or(false);
            if immediate {
                match state.archive_now().await {
                    Ok(ArchiveOutcome::Archived { folder }) => {
                        ok(ApiResponse::ok_with_message("archived").with("folder", json!(folder)))
                    }
                    Ok(ArchiveOutcome::Skipped(reason)) => ok(ApiResponse::ok_with_message(
                        format!("archive skipped: {reason:?}"),
                    )),
                    Err(error) => internal_error(error),
                }
            } else if state.request_archive() {
                ok(ApiResponse::ok_with_message("archive scheduled"))
            } else {
                bad_request("no archivable project is open".to_string())
            }
        }
        "switchProject" => {
            let Some(project) = string_field(&data, "projectId") else {
                return bad_request("switchProject requires `projectId`".to_string());
            };
            match state.switch_project(&project).await {
                Ok(snapshot) => match serde_json::to_value(&snapshot) {
                    Ok(value) => ok(ApiResponse::ok().with("snapshot", value)),
                    Err(error) => internal_error(error.into()),
                },
                Err(error) => internal_error(error),
            }
        }
        "loadProject" => {
            let Some(project) = string_field(&data, "projectId") else {
                return bad_request("loadProject requires `projectId`".to_string());
            };
            match state.load_project(&project) {
                Some(resolution) => match serde_json::to_value(&resolution.snapshot) {
                    Ok(value) => ok(ApiResponse::ok().with("snapshot", value)),
                    Err(error) => internal_error(error.into()),
                },
                None => not_found(format!("project `{project}` not found")),
            }
        }
        "deleteProject" => {
            let Some(project) = string_field(&data, "projectId") else {
                return bad_request("deleteProject requires `projectId`".to_string());
            };
            match state.delete_project(&project).await {
                Ok(DeleteOutcome::Deleted { folder }) => {
                    ok(ApiResponse::ok_with_message("deleted").with("folder", json!(folder)))
                }
                Ok(DeleteOutcome::NotFound) => {
                    not_found(format!("project `{project}` not found"))
                }
                Err(error) => internal_error(error),
            }
        }
        "markProcessed" => {
            let ids: Vec<String> = data
                .get("ids")
                .and_then(Value::as_array)
                .map(|ids| {
                    ids.iter().filter_map(Value::as_str).map(str::to_string).collect()
                })
                .unwrap_or_default();
            if ids.is_empty() {
                return bad_request("markProcessed requires a non-empty `ids` list".to_string());
            }
            match state.pending.mark_processed(&ids) {
                Ok(changed) => ok(ApiResponse::ok().with("processed", json!(changed))),
                Err(error) => internal_error(error),
            }
        }
        "clearPendingEdits" => match state.pending.clear() {
            Ok(()) => ok(ApiResponse::ok_with_message("pending edits cleared")),
            Err(error) => internal_error(error),
        },
        "forceRefresh" => {
            state.force_refresh();
            ok(ApiResponse::ok_with_message("refresh broadcast"))
        }
        edit_action if QUEUEABLE_ACTIONS.contains(&edit_action) => {
            if let Err(message) = validate_edit(edit_action, &data) {
                return bad_request(message);
            }
            match state.queue_edit(edit_action, data) {
                Ok(edit) => ok(ApiResponse::ok_with_message("edit queued")
                    .with("editId", json!(edit.id))),
                Err(error) => internal_error(error),
            }
        }
        other => bad_request(format!("unknown action `{other}`")),
    }
}

/// Per-action payload validation for queueable edits. The daemon never
/// applies these itself, but rejecting garbage here beats every client
/// discovering it independently.
fn validate_edit(action: &str, data: &Value) -> Result<(), String> {
    match action {
        "addText" | "addSubtitle" => match string_field(data, "text") {
            Some(text) if !text.trim().is_empty() => Ok(()),
            _ => Err(format!("{action} requires non-empty `text`")),
        },
        "addMultipleSubtitles" => match data.get("subtitles").and_then(Value::as_array) {
            Some(subtitles) if !subtitles.is_empty() => Ok(()),
            _ => Err("addMultipleSubtitles requires a non-empty `subtitles` list".to_string()),
        },
        "removeElement" | "updateElement" => match string_field(data, "elementId") {
            Some(_) => Ok(()),
            None => Err(format!("{action} requires `elementId`")),
        },
        "splitElement" => {
            if string_field(data, "elementId").is_none() {
                return Err("splitElement requires `elementId`".to_string());
            }
            match data.get("splitTime").and_then(Value::as_f64) {
                Some(_) => Ok(()),
                None => Err("splitElement requires numeric `splitTime`".to_string()),
            }
        }
        "moveElement" => {
            if string_field(data, "elementId").is_none() {
                return Err("moveElement requires `elementId`".to_string());
            }
            let has_position = data.get("startTime").and_then(Value::as_f64).is_some()
                || data.get("delta").and_then(Value::as_f64).is_some()
                || string_field(data, "trackId").is_some();
            if has_position {
                Ok(())
            } else {
                Err("moveElement requires `startTime`, `delta`, or `trackId`".to_string())
            }
        }
        "addMarkers" => match data.get("markers").and_then(Value::as_array) {
            Some(markers) if markers.iter().any(|m| m.as_f64().is_some()) => Ok(()),
            _ => Err("addMarkers requires a non-empty numeric `markers` list".to_string()),
        },
        "setFullState" => {
            if data.get("project").is_some() || data.get("tracks").is_some() {
                Ok(())
            } else {
                Err("setFullState requires `project` or `tracks`".to_string())
            }
        }
        _ => Ok(()),
    }
}

fn string_field(data: &Value, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(str::to_string)
}

fn ok(response: ApiResponse) -> (StatusCode, Json<ApiResponse>) {
    (StatusCode::OK, Json(response))
}

fn bad_request(message: String) -> (StatusCode, Json<ApiResponse>) {
    (StatusCode::BAD_REQUEST, Json(ApiResponse::err(message)))
}

fn not_found(message: impl Into<String>) -> (StatusCode, Json<ApiResponse>) {
    (StatusCode::NOT_FOUND, Json(ApiResponse::err(message)))
}

fn internal_error(error: anyhow::Error) -> (StatusCode, Json<ApiResponse>) {
    warn!(?error, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ApiResponse::err(error.to_string())))
}
