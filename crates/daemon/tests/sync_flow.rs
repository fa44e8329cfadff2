// End-to-end flows through the daemon state: project lifecycle across
// workspace and archive, rename tolerance, and subscriber ordering.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};

use cutsync_common::protocol::SyncEvent;
use cutsync_daemon::config::{DaemonConfig, DataDirs};
use cutsync_daemon::runtime::SyncState;

fn state(tmp: &TempDir) -> Arc<SyncState> {
    let dirs = DataDirs::new(tmp.path().join("data"));
    dirs.ensure().unwrap();
    Arc::new(SyncState::new(&dirs, DaemonConfig::default()).unwrap())
}

fn project_payload(id: &str, name: &str) -> Value {
    json!({
        "project": {
            "id": id,
            "name": name,
            "createdAt": "2026-01-01T00:00:00Z",
            "updatedAt": "2026-01-01T00:00:00Z"
        },
        "tracks": [],
        "assets": []
    })
}

// ── lifecycle ──

#[tokio::test]
async fn rename_keeps_one_folder_and_one_identity_entry() {
    let tmp = tempdir().unwrap();
    let state = state(&tmp);

    state.update_snapshot(project_payload("p1", "Draft")).await.unwrap();
    state.archive_now().await.unwrap();

    // The user renames the project; the next archive must move the folder
    // rather than fork a second copy.
    state
        .update_snapshot(json!({"project": {"id": "p1", "name": "Final"}}))
        .await
        .unwrap();
    state.archive_now().await.unwrap();

    assert!(state.archive.find_project_folder("p1").is_some());
    assert!(!state.archive.folder_path("Draft").exists());
    assert!(state.archive.folder_path("Final").exists());

    let map = state.archive.id_map();
    assert_eq!(map.len(), 1);
    assert_eq!(map.get("Final"), Some(&"p1".to_string()));

    // All three addressing forms resolve to the renamed project.
    for key in ["p1", "Final"] {
        let resolution = state.load_project(key).unwrap();
        assert_eq!(resolution.snapshot.project.id.as_str(), "p1");
        assert_eq!(resolution.snapshot.project.name, "Final");
    }
    assert!(state.load_project("Draft").is_none());
}

#[tokio::test]
async fn switching_between_projects_round_trips_both() {
    let tmp = tempdir().unwrap();
    let state = state(&tmp);

    state.switch_project("alpha").await.unwrap();
    state
        .update_snapshot(json!({"project": {"id": "alpha", "name": "Alpha Cut"}}))
        .await
        .unwrap();

    state.switch_project("beta").await.unwrap();
    state
        .update_snapshot(json!({"project": {"id": "beta", "name": "Beta Cut"}}))
        .await
        .unwrap();

    let alpha = state.switch_project("alpha").await.unwrap();
    assert_eq!(alpha.project.name, "Alpha Cut");

    let projects = state.list_projects();
    assert_eq!(projects.len(), 2);

    let beta = state.switch_project("beta").await.unwrap();
    assert_eq!(beta.project.name, "Beta Cut");
}

#[tokio::test]
async fn deleted_project_stays_deleted_across_switch() {
    let tmp = tempdir().unwrap();
    let state = state(&tmp);

    state.update_snapshot(project_payload("p1", "Doomed")).await.unwrap();
    state.archive_now().await.unwrap();
    state.delete_project("p1").await.unwrap();

    // Switching back creates a fresh default document, not the old one.
    let snapshot = state.switch_project("p1").await.unwrap();
    assert_eq!(snapshot.project.name, "p1");
    assert!(snapshot.tracks.iter().all(|t| t.elements.is_empty()));
}

#[tokio::test]
async fn update_without_assets_does_not_clobber_them() {
    let tmp = tempdir().unwrap();
    let state = state(&tmp);

    let mut payload = project_payload("p1", "With Assets");
    payload["assets"] = json!([
        {"id": "a1", "type": "video", "name": "clip", "url": "/materials/clip.mp4"}
    ]);
    state.update_snapshot(payload).await.unwrap();

    state
        .update_snapshot(json!({
            "project": {"id": "p1", "name": "With Assets"},
            "tracks": []
        }))
        .await
        .unwrap();

    let document = state.current_document().unwrap();
    assert_eq!(document["assets"][0]["id"], "a1");
}

// ── subscriber ordering ──

#[tokio::test]
async fn subscriber_sees_writes_in_order() {
    let tmp = tempdir().unwrap();
    let state = state(&tmp);
    let mut rx = state.hub.subscribe();

    state.update_snapshot(project_payload("p1", "v1")).await.unwrap();
    state.update_snapshot(json!({"project": {"id": "p1", "name": "v2"}})).await.unwrap();
    state.update_snapshot(json!({"project": {"id": "p1", "name": "v3"}})).await.unwrap();

    let mut names = Vec::new();
    for _ in 0..3 {
        match tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap() {
            SyncEvent::SnapshotUpdate(snapshot) => names.push(snapshot.project.name.clone()),
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(names, ["v1", "v2", "v3"]);
}

#[tokio::test]
async fn edit_queue_flows_to_subscribers_and_acks_persist() {
    let tmp = tempdir().unwrap();
    let state = state(&tmp);
    let mut rx = state.hub.subscribe();

    let queued = state.queue_edit("addSubtitle", json!({"text": "hello"})).unwrap();
    let event = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
    let SyncEvent::Edit(edit) = event else { panic!("expected edit event") };
    assert_eq!(edit.id, queued.id);

    state.pending.mark_processed(std::slice::from_ref(&edit.id)).unwrap();
    assert!(state.pending.unprocessed().is_empty());
    // The processed entry is retained for inspection.
    assert_eq!(state.pending.load().len(), 1);
}
