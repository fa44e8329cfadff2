// Application of queued automation edits to the local document.
//
// Edits arrive as loosely-typed JSON payloads (the queue is shared with
// scripts in other languages), so field access is defensive: required
// fields error, optional ones take editor defaults.

use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use cutsync_common::protocol::PendingEdit;
use cutsync_common::types::{
    Asset, Element, Project, Snapshot, TextElement, TextStyle, Track, TrackKind,
    SUBTITLE_PLACEHOLDER_TRACK,
};

/// Track created to hold generated subtitles.
pub const AI_SUBTITLE_TRACK: &str = "AI Subtitles";

const DEFAULT_TEXT_DURATION: f64 = 3.0;

#[derive(Debug, Error)]
pub enum EditError {
    #[error("unknown edit action `{0}`")]
    UnknownAction(String),
    #[error("edit `{action}` is missing field `{field}`")]
    MissingField { action: String, field: &'static str },
    #[error("element `{0}` not found")]
    ElementNotFound(String),
    #[error("track `{0}` not found")]
    TrackNotFound(String),
    #[error("edit `{action}` has an out-of-range `{field}`")]
    InvalidField { action: String, field: &'static str },
    #[error("malformed edit payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Apply one queued edit to the document in place.
pub fn apply_edit(snapshot: &mut Snapshot, edit: &PendingEdit) -> Result<(), EditError> {
    match edit.action.as_str() {
        "addText" | "addSubtitle" => add_text(snapshot, &edit.action, &edit.data),
        "addMultipleSubtitles" => add_multiple_subtitles(snapshot, &edit.data),
        "clearSubtitles" => {
            snapshot.tracks.retain(|track| {
                track.name != AI_SUBTITLE_TRACK && track.name != SUBTITLE_PLACEHOLDER_TRACK
            });
            Ok(())
        }
        "removeElement" => remove_element(snapshot, &edit.data),
        "updateElement" => update_element(snapshot, &edit.data),
        "splitElement" => split_element(snapshot, &edit.data),
        "moveElement" => move_element(snapshot, &edit.data),
        "addMarkers" => add_markers(snapshot, &edit.data),
        "setFullState" => set_full_state(snapshot, &edit.data),
        other => Err(EditError::UnknownAction(other.to_string())),
    }
}

fn add_text(snapshot: &mut Snapshot, action: &str, data: &Value) -> Result<(), EditError> {
    let text = require_str(data, action, "text")?;
    let element = text_element(
        text,
        data.get("startTime").and_then(Value::as_f64).unwrap_or(0.0),
        data.get("duration").and_then(Value::as_f64).unwrap_or(DEFAULT_TEXT_DURATION),
        style_from(data)?,
    );

    match snapshot
        .tracks
        .iter_mut()
        .find(|track| track.kind == TrackKind::Text && !track.is_placeholder())
    {
        Some(track) => track.elements.push(element),
        None => snapshot.tracks.push(new_text_track("Text Track", vec![element])),
    }
    Ok(())
}

/// Replace generated subtitles wholesale: drop the placeholder and any
/// previous generation, then lay the new set on a fresh track.
fn add_multiple_subtitles(snapshot: &mut Snapshot, data: &Value) -> Result<(), EditError> {
    let entries = data.get("subtitles").and_then(Value::as_array).ok_or_else(|| {
        EditError::MissingField { action: "addMultipleSubtitles".to_string(), field: "subtitles" }
    })?;

    let mut elements = Vec::with_capacity(entries.len());
    for entry in entries {
        let text = require_str(entry, "addMultipleSubtitles", "text")?;
        elements.push(text_element(
            text,
            entry.get("startTime").and_then(Value::as_f64).unwrap_or(0.0),
            entry.get("duration").and_then(Value::as_f64).unwrap_or(DEFAULT_TEXT_DURATION),
            style_from(entry)?,
        ));
    }

    snapshot.tracks.retain(|track| {
        track.name != AI_SUBTITLE_TRACK && track.name != SUBTITLE_PLACEHOLDER_TRACK
    });
    snapshot.tracks.push(new_text_track(AI_SUBTITLE_TRACK, elements));
    Ok(())
}

fn remove_element(snapshot: &mut Snapshot, data: &Value) -> Result<(), EditError> {
    let element_id = require_str(data, "removeElement", "elementId")?;
    let mut removed = false;
    for track in &mut snapshot.tracks {
        let before = track.elements.len();
        track.elements.retain(|element| element.id() != element_id);
        removed |= track.elements.len() != before;
    }
    if removed {
        Ok(())
    } else {
        Err(EditError::ElementNotFound(element_id.to_string()))
    }
}

fn update_element(snapshot: &mut Snapshot, data: &Value) -> Result<(), EditError> {
    let element_id = require_str(data, "updateElement", "elementId")?;
    let element = snapshot
        .tracks
        .iter_mut()
        .flat_map(|track| &mut track.elements)
        .find(|element| element.id() == element_id)
        .ok_or_else(|| EditError::ElementNotFound(element_id.to_string()))?;

    if let Some(start) = data.get("startTime").and_then(Value::as_f64) {
        element.set_start_time(start);
    }
    match element {
        Element::Text(text) => {
            if let Some(content) = data.get("text").and_then(Value::as_str) {
                text.content = content.to_string();
            }
            if let Some(duration) = data.get("duration").and_then(Value::as_f64) {
                text.duration = duration;
            }
        }
        Element::Media(media) => {
            if let Some(duration) = data.get("duration").and_then(Value::as_f64) {
                media.duration = duration;
            }
        }
    }
    Ok(())
}

/// Cut an element in two at `splitTime` (timeline seconds). The first half
/// keeps the id; the second half starts at the cut with its trim advanced
/// so media playback stays continuous.
fn split_element(snapshot: &mut Snapshot, data: &Value) -> Result<(), EditError> {
    let element_id = require_str(data, "splitElement", "elementId")?;
    let split_time = data.get("splitTime").and_then(Value::as_f64).ok_or_else(|| {
        EditError::MissingField { action: "splitElement".to_string(), field: "splitTime" }
    })?;

    for track in &mut snapshot.tracks {
        let Some(index) = track.elements.iter().position(|e| e.id() == element_id) else {
            continue;
        };
        let original = &track.elements[index];
        let start = original.start_time();
        let duration = element_duration(original);
        let offset = split_time - start;
        if offset <= 0.0 || offset >= duration {
            return Err(EditError::InvalidField {
                action: "splitElement".to_string(),
                field: "splitTime",
            });
        }

        let mut second = original.clone();
        match &mut second {
            Element::Media(media) => {
                media.id = format!("element_{}", Uuid::new_v4().simple());
                media.start_time = split_time;
                media.duration = duration - offset;
                media.trim_start += offset;
            }
            Element::Text(text) => {
                text.id = format!("element_{}", Uuid::new_v4().simple());
                text.start_time = split_time;
                text.duration = duration - offset;
            }
        }
        match &mut track.elements[index] {
            Element::Media(media) => media.duration = offset,
            Element::Text(text) => text.duration = offset,
        }
        track.elements.insert(index + 1, second);
        return Ok(());
    }
    Err(EditError::ElementNotFound(element_id.to_string()))
}

/// Reposition an element: absolute `startTime`, relative `delta`, and an
/// optional `trackId` to land it on another track. Start times clamp at 0.
fn move_element(snapshot: &mut Snapshot, data: &Value) -> Result<(), EditError> {
    let element_id = require_str(data, "moveElement", "elementId")?;
    let new_start = data.get("startTime").and_then(Value::as_f64);
    let delta = data.get("delta").and_then(Value::as_f64);
    let target_track = data.get("trackId").and_then(Value::as_str);
    if new_start.is_none() && delta.is_none() && target_track.is_none() {
        return Err(EditError::MissingField {
            action: "moveElement".to_string(),
            field: "startTime",
        });
    }

    let (track_index, element_index) = snapshot
        .tracks
        .iter()
        .enumerate()
        .find_map(|(ti, track)| {
            track.elements.iter().position(|e| e.id() == element_id).map(|ei| (ti, ei))
        })
        .ok_or_else(|| EditError::ElementNotFound(element_id.to_string()))?;

    let current = snapshot.tracks[track_index].elements[element_index].start_time();
    let start = new_start.unwrap_or(current + delta.unwrap_or(0.0)).max(0.0);

    match target_track {
        Some(track_id) if track_id != snapshot.tracks[track_index].id => {
            let destination = snapshot
                .tracks
                .iter()
                .position(|t| t.id == track_id)
                .ok_or_else(|| EditError::TrackNotFound(track_id.to_string()))?;
            let mut element = snapshot.tracks[track_index].elements.remove(element_index);
            element.set_start_time(start);
            snapshot.tracks[destination].elements.push(element);
        }
        _ => snapshot.tracks[track_index].elements[element_index].set_start_time(start),
    }
    Ok(())
}

/// Append marker times to the project timeline, keeping them sorted and
/// deduplicated.
fn add_markers(snapshot: &mut Snapshot, data: &Value) -> Result<(), EditError> {
    let markers = data.get("markers").and_then(Value::as_array).ok_or_else(|| {
        EditError::MissingField { action: "addMarkers".to_string(), field: "markers" }
    })?;
    let times: Vec<f64> = markers.iter().filter_map(Value::as_f64).collect();
    if times.is_empty() {
        return Err(EditError::MissingField {
            action: "addMarkers".to_string(),
            field: "markers",
        });
    }

    snapshot.project.markers.extend(times);
    snapshot
        .project
        .markers
        .sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    snapshot.project.markers.dedup();
    Ok(())
}

fn element_duration(element: &Element) -> f64 {
    match element {
        Element::Media(media) => media.duration,
        Element::Text(text) => text.duration,
    }
}

/// Replace whole sections of the document from a full-state payload.
fn set_full_state(snapshot: &mut Snapshot, data: &Value) -> Result<(), EditError> {
    if let Some(project) = data.get("project").filter(|v| !v.is_null()) {
        snapshot.project = serde_json::from_value::<Project>(project.clone())?;
    }
    if let Some(tracks) = data.get("tracks").filter(|v| !v.is_null()) {
        snapshot.tracks = serde_json::from_value::<Vec<Track>>(tracks.clone())?;
    }
    if let Some(assets) = data.get("assets").filter(|v| !v.is_null()) {
        snapshot.assets = serde_json::from_value::<Vec<Asset>>(assets.clone())?;
    }
    Ok(())
}

fn text_element(text: &str, start_time: f64, duration: f64, style: TextStyle) -> Element {
    Element::Text(TextElement {
        id: format!("element_{}", Uuid::new_v4().simple()),
        content: text.to_string(),
        start_time,
        duration,
        trim_start: 0.0,
        trim_end: 0.0,
        style,
    })
}

fn new_text_track(name: &str, elements: Vec<Element>) -> Track {
    Track {
        id: format!("track_{}", Uuid::new_v4().simple()),
        name: name.to_string(),
        kind: TrackKind::Text,
        elements,
        muted: false,
        is_main: false,
    }
}

/// Style overrides ride flat on the payload (camelCase keys); anything the
/// payload doesn't set takes the subtitle preset defaults.
fn style_from(data: &Value) -> Result<TextStyle, EditError> {
    Ok(serde_json::from_value(data.clone())?)
}

fn require_str<'a>(data: &'a Value, action: &str, field: &'static str) -> Result<&'a str, EditError> {
    data.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| EditError::MissingField { action: action.to_string(), field })
}
