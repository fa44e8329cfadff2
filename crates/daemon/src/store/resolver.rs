// Newest-wins resolution between the live workspace and the archive.
//
// Both locations can hold a document for the same project (the archive lags
// the workspace by the debounce window; external tools may touch either).
// The freshest copy wins by file modification time, with an identity check
// so a workspace document belonging to a different project never shadows
// the archive.

use std::time::SystemTime;

use tracing::debug;

use cutsync_common::path::sanitize_folder_name;
use cutsync_common::types::Snapshot;

use super::archive::ProjectArchive;
use super::workspace::WorkspaceStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Workspace,
    Archive,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub location: Location,
    /// Archive folder holding the project, when one exists.
    pub folder: Option<String>,
    pub snapshot: Snapshot,
}

/// Resolve the freshest readable document for a project addressed by
/// internal id or display name. Ties go to the archive: the workspace wins
/// only when strictly newer.
pub fn resolve(
    workspace: &WorkspaceStore,
    archive: &ProjectArchive,
    id_or_name: &str,
) -> Option<Resolution> {
    let archived = archive.read(id_or_name);
    let folder = archived.as_ref().map(|(folder, _)| folder.clone());

    let live = workspace.read().filter(|snapshot| workspace_matches(snapshot, id_or_name));

    match (live, archived) {
        (Some(live), Some((folder, archived_snapshot))) => {
            let live_mtime = workspace.mtime();
            let archive_mtime = archive.snapshot_mtime(&folder);
            if is_strictly_newer(live_mtime, archive_mtime) {
                debug!(project = %id_or_name, "workspace document is newer than archive");
                Some(Resolution {
                    location: Location::Workspace,
                    folder: Some(folder),
                    snapshot: live,
                })
            } else {
                Some(Resolution {
                    location: Location::Archive,
                    folder: Some(folder),
                    snapshot: archived_snapshot,
                })
            }
        }
        (Some(live), None) => {
            Some(Resolution { location: Location::Workspace, folder: None, snapshot: live })
        }
        (None, Some((folder, snapshot))) => {
            Some(Resolution { location: Location::Archive, folder: Some(folder), snapshot })
        }
        (None, None) => {
            debug!(project = %id_or_name, folder = ?folder, "no readable document found");
            None
        }
    }
}

/// The workspace document stands in for a project only when it actually
/// belongs to it. Deleted-sentinel documents never match.
fn workspace_matches(snapshot: &Snapshot, id_or_name: &str) -> bool {
    if snapshot.project.id.is_deleted_sentinel() {
        return false;
    }
    snapshot.project.id.as_str() == id_or_name
        || snapshot.project.name == id_or_name
        || sanitize_folder_name(&snapshot.project.name) == id_or_name
}

fn is_strictly_newer(candidate: Option<SystemTime>, baseline: Option<SystemTime>) -> bool {
    match (candidate, baseline) {
        (Some(candidate), Some(baseline)) => candidate > baseline,
        (Some(_), None) => true,
        _ => false,
    }
}
