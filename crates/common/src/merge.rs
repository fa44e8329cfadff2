// Asset-preserving merge for workspace updates.
//
// An `updateSnapshot` payload from a session may carry any subset of
// { project, tracks, assets }. Sections the payload omits must survive from
// the existing document; in particular an update that never mentions assets
// must not delete them. Project metadata merges key-by-key so partial
// project objects from automation do not wipe fields they don't know about.

use serde_json::{Map, Value};

/// Merge an update payload into the existing workspace document.
///
/// Rules:
/// - `project`: key-by-key overlay of the incoming object on the existing
///   one; `markers` fall back to the existing list when the update omits
///   them.
/// - `tracks`: replaced wholesale when present, kept otherwise.
/// - `assets`: replaced when present, otherwise preserved (empty list when
///   neither side has any).
///
/// Operates on raw JSON so partially-shaped payloads from external writers
/// merge the same way fully-typed ones do.
pub fn merge_update(existing: Option<&Value>, update: &Value) -> Value {
    let existing_map = existing.and_then(Value::as_object);
    let mut merged = existing_map.cloned().unwrap_or_default();

    // Project: object overlay with marker preservation.
    let existing_project = existing_map.and_then(|m| m.get("project")).and_then(Value::as_object);
    let update_project = update.get("project").and_then(Value::as_object);
    let mut project = existing_project.cloned().unwrap_or_default();
    if let Some(incoming) = update_project {
        for (key, value) in incoming {
            project.insert(key.clone(), value.clone());
        }
    }
    let markers = update_project
        .and_then(|p| p.get("markers"))
        .filter(|m| !m.is_null())
        .or_else(|| existing_project.and_then(|p| p.get("markers")))
        .cloned()
        .unwrap_or_else(|| Value::Array(Vec::new()));
    project.insert("markers".to_string(), markers);
    merged.insert("project".to_string(), Value::Object(project));

    // Tracks: replace only when provided.
    if let Some(tracks) = update.get("tracks").filter(|t| !t.is_null()) {
        merged.insert("tracks".to_string(), tracks.clone());
    }

    // Assets: preserve when the update omits them.
    let assets = update
        .get("assets")
        .filter(|a| !a.is_null())
        .cloned()
        .or_else(|| existing_map.and_then(|m| m.get("assets")).cloned())
        .unwrap_or_else(|| Value::Array(Vec::new()));
    merged.insert("assets".to_string(), assets);

    Value::Object(merged)
}

/// Overlay for `saveSnapshot`: project and tracks replace when present,
/// everything else (assets included) carries over untouched.
pub fn overlay_sections(existing: Option<&Value>, update: &Value) -> Value {
    let mut merged: Map<String, Value> =
        existing.and_then(Value::as_object).cloned().unwrap_or_default();
    for section in ["project", "tracks"] {
        if let Some(value) = update.get(section).filter(|v| !v.is_null()) {
            merged.insert(section.to_string(), value.clone());
        }
    }
    Value::Object(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn existing() -> Value {
        json!({
            "project": {
                "id": "p1",
                "name": "Demo",
                "fps": 30.0,
                "markers": [1.0, 2.5]
            },
            "tracks": [{"id": "t1", "type": "text", "name": "Text", "elements": []}],
            "assets": [{"id": "a1", "type": "video", "name": "clip", "url": "/materials/clip.mp4"}]
        })
    }

    #[test]
    fn update_without_assets_preserves_existing_assets() {
        let update = json!({
            "project": {"id": "p1", "name": "Demo"},
            "tracks": []
        });
        let merged = merge_update(Some(&existing()), &update);
        assert_eq!(merged["assets"], existing()["assets"]);
        assert_eq!(merged["tracks"], json!([]));
    }

    #[test]
    fn update_with_assets_replaces_them() {
        let update = json!({ "assets": [{"id": "a2", "type": "image", "name": "still", "url": "/materials/s.png"}] });
        let merged = merge_update(Some(&existing()), &update);
        assert_eq!(merged["assets"][0]["id"], "a2");
        // Tracks untouched when not provided.
        assert_eq!(merged["tracks"], existing()["tracks"]);
    }

    #[test]
    fn project_merges_key_by_key() {
        let update = json!({ "project": {"name": "Renamed"} });
        let merged = merge_update(Some(&existing()), &update);
        assert_eq!(merged["project"]["name"], "Renamed");
        assert_eq!(merged["project"]["id"], "p1");
        assert_eq!(merged["project"]["fps"], 30.0);
    }

    #[test]
    fn markers_survive_when_update_omits_them() {
        let update = json!({ "project": {"name": "Renamed"} });
        let merged = merge_update(Some(&existing()), &update);
        assert_eq!(merged["project"]["markers"], json!([1.0, 2.5]));

        let with_markers = json!({ "project": {"markers": [9.0]} });
        let merged = merge_update(Some(&existing()), &with_markers);
        assert_eq!(merged["project"]["markers"], json!([9.0]));
    }

    #[test]
    fn merge_into_empty_workspace() {
        let update = json!({ "project": {"id": "p9", "name": "Fresh"}, "tracks": [] });
        let merged = merge_update(None, &update);
        assert_eq!(merged["project"]["id"], "p9");
        assert_eq!(merged["assets"], json!([]));
        assert_eq!(merged["project"]["markers"], json!([]));
    }

    #[test]
    fn overlay_keeps_untouched_sections() {
        let update = json!({ "tracks": [{"id": "t9", "type": "audio", "name": "A", "elements": []}] });
        let merged = overlay_sections(Some(&existing()), &update);
        assert_eq!(merged["tracks"][0]["id"], "t9");
        assert_eq!(merged["project"], existing()["project"]);
        assert_eq!(merged["assets"], existing()["assets"]);
    }
}
