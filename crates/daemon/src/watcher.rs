// Filesystem watch on the workspace directory.
//
// External automation writes `snapshot.json` and `pending-edits.json`
// directly; the watcher turns those writes into signals the runtime reacts
// to (publish the new document, broadcast fresh edits). Watching is
// non-recursive: history backups must not feed back into the loop.

use std::path::Path;

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::warn;

const SNAPSHOT_FILE: &str = "snapshot.json";
const PENDING_EDITS_FILE: &str = "pending-edits.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchSignal {
    SnapshotChanged,
    PendingEditsChanged,
}

/// Map one filesystem event onto watch signals, at most one of each kind.
/// Access events and unrelated paths (temp files, history) produce nothing.
pub fn classify(event: &Event) -> Vec<WatchSignal> {
    if matches!(event.kind, EventKind::Access(_)) {
        return Vec::new();
    }
    let mut signals = Vec::new();
    for path in &event.paths {
        let signal = match path.file_name().and_then(|n| n.to_str()) {
            Some(SNAPSHOT_FILE) => WatchSignal::SnapshotChanged,
            Some(PENDING_EDITS_FILE) => WatchSignal::PendingEditsChanged,
            _ => continue,
        };
        if !signals.contains(&signal) {
            signals.push(signal);
        }
    }
    signals
}

/// Owns the platform watcher; dropping it stops the watch.
pub struct WorkspaceWatcher {
    _watcher: RecommendedWatcher,
    receiver: mpsc::UnboundedReceiver<WatchSignal>,
}

impl WorkspaceWatcher {
    pub fn spawn(workspace_dir: &Path) -> Result<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut watcher =
            notify::recommended_watcher(move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    for signal in classify(&event) {
                        // Receiver dropped means the runtime is shutting down.
                        let _ = sender.send(signal);
                    }
                }
                Err(error) => warn!(?error, "workspace watch error"),
            })
            .context("failed to create filesystem watcher")?;
        watcher
            .watch(workspace_dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch `{}`", workspace_dir.display()))?;
        Ok(Self { _watcher: watcher, receiver })
    }

    pub async fn recv(&mut self) -> Option<WatchSignal> {
        self.receiver.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, ModifyKind};
    use std::path::PathBuf;

    fn modify_event(paths: &[&str]) -> Event {
        let mut event = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Any)));
        for path in paths {
            event = event.add_path(PathBuf::from(path));
        }
        event
    }

    #[test]
    fn snapshot_write_signals_snapshot_changed() {
        let event = modify_event(&["/data/workspace/snapshot.json"]);
        assert_eq!(classify(&event), vec![WatchSignal::SnapshotChanged]);
    }

    #[test]
    fn pending_edits_write_signals_edits_changed() {
        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/data/workspace/pending-edits.json"));
        assert_eq!(classify(&event), vec![WatchSignal::PendingEditsChanged]);
    }

    #[test]
    fn unrelated_and_temp_paths_are_ignored() {
        let event = modify_event(&[
            "/data/workspace/snapshot.tmp.123",
            "/data/workspace/history/snapshot_2026.json",
            "/data/workspace/other.txt",
        ]);
        assert!(classify(&event).is_empty());
    }

    #[test]
    fn access_events_are_ignored() {
        let event = Event::new(EventKind::Access(AccessKind::Any))
            .add_path(PathBuf::from("/data/workspace/snapshot.json"));
        assert!(classify(&event).is_empty());
    }

    #[test]
    fn one_event_touching_both_files_yields_both_signals_once() {
        let event = modify_event(&[
            "/data/workspace/snapshot.json",
            "/data/workspace/pending-edits.json",
            "/data/workspace/snapshot.json",
        ]);
        assert_eq!(
            classify(&event),
            vec![WatchSignal::SnapshotChanged, WatchSignal::PendingEditsChanged]
        );
    }
}
