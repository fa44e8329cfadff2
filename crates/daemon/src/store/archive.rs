// Per-project archive with a rename-tolerant identity map.
//
// Each archived project lives in `projects/<folder>/snapshot.json`, where
// the folder name is derived from the project's display name. Because
// display names change, `projects/project_ids.json` maps folder name to the
// stable internal id; stale folder names for an id are pruned on every map
// write, so a folder name resolves to at most one id at read time.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

use cutsync_common::path::sanitize_folder_name;
use cutsync_common::protocol::ProjectEntry;
use cutsync_common::types::{ProjectId, Snapshot};

use super::workspace::WorkspaceStore;

pub const ARCHIVE_SNAPSHOT_FILE: &str = "snapshot.json";

/// Result of an archive request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Archived { folder: String },
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The workspace holds no document to archive.
    NoWorkspaceDocument,
    /// The workspace project id carries the deleted sentinel; archiving
    /// would resurrect a just-deleted project.
    DeletedSentinel,
}

#[derive(Debug, Clone)]
pub struct ProjectArchive {
    projects_dir: PathBuf,
    id_map_file: PathBuf,
}

impl ProjectArchive {
    pub fn new(projects_dir: impl Into<PathBuf>, id_map_file: impl Into<PathBuf>) -> Result<Self> {
        let projects_dir = projects_dir.into();
        fs::create_dir_all(&projects_dir).with_context(|| {
            format!("failed to create projects directory `{}`", projects_dir.display())
        })?;
        Ok(Self { projects_dir, id_map_file: id_map_file.into() })
    }

    /// Folder-name -> internal-id map. Missing or corrupt files read as
    /// empty; the map is rebuilt incrementally on subsequent archives.
    pub fn id_map(&self) -> BTreeMap<String, String> {
        let Ok(contents) = fs::read_to_string(&self.id_map_file) else {
            return BTreeMap::new();
        };
        match serde_json::from_str(&contents) {
            Ok(map) => map,
            Err(error) => {
                warn!(?error, "identity map is corrupt, starting from empty");
                BTreeMap::new()
            }
        }
    }

    /// Record `folder -> id`, pruning any other folder names still pointing
    /// at the same id.
    fn save_id_map_entry(&self, folder: &str, id: &ProjectId) -> Result<()> {
        let mut map = self.id_map();
        map.retain(|existing_folder, existing_id| {
            existing_id != id.as_str() || existing_folder == folder
        });
        map.insert(folder.to_string(), id.as_str().to_string());
        self.write_id_map(&map)
    }

    fn remove_id_map_folder(&self, folder: &str) -> Result<()> {
        let mut map = self.id_map();
        if map.remove(folder).is_some() {
            self.write_id_map(&map)?;
        }
        Ok(())
    }

    fn write_id_map(&self, map: &BTreeMap<String, String>) -> Result<()> {
        let encoded = serde_json::to_vec_pretty(map).context("failed to encode identity map")?;
        fs::write(&self.id_map_file, encoded).with_context(|| {
            format!("failed to write identity map `{}`", self.id_map_file.display())
        })
    }

    /// Find the archive folder for a project, addressed either by internal
    /// id or by what it currently looks like on disk: a direct folder-name
    /// match first, then a reverse lookup through the identity map.
    pub fn find_project_folder(&self, id_or_name: &str) -> Option<String> {
        if id_or_name.is_empty() {
            return None;
        }
        let direct = self.projects_dir.join(id_or_name);
        if direct.is_dir() {
            return Some(id_or_name.to_string());
        }
        self.id_map()
            .into_iter()
            .find(|(_, id)| id == id_or_name)
            .map(|(folder, _)| folder)
    }

    pub fn folder_path(&self, folder: &str) -> PathBuf {
        self.projects_dir.join(folder)
    }

    pub fn snapshot_path(&self, folder: &str) -> PathBuf {
        self.folder_path(folder).join(ARCHIVE_SNAPSHOT_FILE)
    }

    pub fn snapshot_mtime(&self, folder: &str) -> Option<SystemTime> {
        fs::metadata(self.snapshot_path(folder)).and_then(|m| m.modified()).ok()
    }

    /// Copy the workspace's current persisted document into the owning
    /// project's archive slot, renaming the folder first when the display
    /// name changed since the last archive.
    pub fn archive(&self, workspace: &WorkspaceStore) -> Result<ArchiveOutcome> {
        let Some(raw) = workspace.read_raw() else {
            debug!("nothing to archive, workspace is empty");
            return Ok(ArchiveOutcome::Skipped(SkipReason::NoWorkspaceDocument));
        };

        let Some(internal_id) = workspace.project_id() else {
            warn!("workspace document has no project id, skipping archive");
            return Ok(ArchiveOutcome::Skipped(SkipReason::NoWorkspaceDocument));
        };
        if internal_id.is_deleted_sentinel() {
            info!(project_id = %internal_id, "refusing to archive deleted project");
            return Ok(ArchiveOutcome::Skipped(SkipReason::DeletedSentinel));
        }

        let display_name = raw
            .get("project")
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
            .unwrap_or(internal_id.as_str());
        let folder = sanitize_folder_name(display_name);

        // A rename failure is non-fatal: the archive proceeds under the new
        // name and the stale folder is pruned from the map below.
        if let Some(existing) = self.find_project_folder(internal_id.as_str()) {
            if existing != folder {
                let old_path = self.folder_path(&existing);
                let new_path = self.folder_path(&folder);
                if new_path.exists() {
                    warn!(from = %existing, to = %folder, "rename target already exists, keeping both");
                } else if let Err(error) = fs::rename(&old_path, &new_path) {
                    warn!(?error, from = %existing, to = %folder, "failed to rename project folder");
                } else {
                    info!(from = %existing, to = %folder, "renamed project folder");
                }
            }
        }

        let project_dir = self.folder_path(&folder);
        fs::create_dir_all(&project_dir).with_context(|| {
            format!("failed to create project directory `{}`", project_dir.display())
        })?;
        self.save_id_map_entry(&folder, &internal_id)?;

        let target = self.snapshot_path(&folder);
        fs::copy(workspace.snapshot_path(), &target).with_context(|| {
            format!("failed to copy workspace document to `{}`", target.display())
        })?;
        info!(project_id = %internal_id, folder = %folder, "archived workspace document");
        Ok(ArchiveOutcome::Archived { folder })
    }

    /// Read a project's archived document. A document whose embedded id
    /// matches neither the requested id nor the folder name is treated as
    /// not found, never as a partial match.
    pub fn read(&self, id_or_name: &str) -> Option<(String, Snapshot)> {
        let folder = self.find_project_folder(id_or_name)?;
        let path = self.snapshot_path(&folder);
        let contents = fs::read_to_string(&path).ok()?;
        let snapshot: Snapshot = match serde_json::from_str(&contents) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(?error, path = %path.display(), "archived document is corrupt");
                return None;
            }
        };
        if snapshot.project.id.as_str() != id_or_name && folder != id_or_name {
            warn!(
                requested = %id_or_name,
                found = %snapshot.project.id,
                "archived document identity mismatch"
            );
            return None;
        }
        Some((folder, snapshot))
    }

    /// Remove a project's archive folder and its identity-map entry.
    /// Returns the removed folder name, or `None` when nothing was archived
    /// under that id.
    pub fn delete(&self, id_or_name: &str) -> Result<Option<String>> {
        let Some(folder) = self.find_project_folder(id_or_name) else {
            return Ok(None);
        };
        let path = self.folder_path(&folder);
        fs::remove_dir_all(&path)
            .with_context(|| format!("failed to delete project folder `{}`", path.display()))?;
        if path.exists() {
            bail!("project folder `{}` still exists after deletion", path.display());
        }
        self.remove_id_map_folder(&folder)?;
        info!(folder = %folder, "deleted project archive");
        Ok(Some(folder))
    }

    /// Enumerate archived projects with a parsable document, deduplicated
    /// by internal id. When multiple folders claim the same id, the folder
    /// matching the project's display name wins.
    pub fn list_projects(&self) -> Vec<ProjectEntry> {
        let mut by_id: BTreeMap<String, ProjectEntry> = BTreeMap::new();
        let Ok(entries) = fs::read_dir(&self.projects_dir) else {
            return Vec::new();
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let folder = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };
            let snapshot_path = path.join(ARCHIVE_SNAPSHOT_FILE);
            let Ok(contents) = fs::read_to_string(&snapshot_path) else {
                continue;
            };
            let snapshot: Snapshot = match serde_json::from_str(&contents) {
                Ok(snapshot) => snapshot,
                Err(error) => {
                    warn!(?error, path = %snapshot_path.display(), "skipping unparsable archive entry");
                    continue;
                }
            };
            let project = snapshot.project;
            let record = ProjectEntry {
                id: project.id.clone(),
                name: project.name.clone(),
                created_at: Some(project.created_at),
                updated_at: Some(project.updated_at),
                folder_name: folder.clone(),
            };
            let preferred = folder == sanitize_folder_name(&project.name);
            match by_id.get(project.id.as_str()) {
                Some(_) if !preferred => {}
                _ => {
                    by_id.insert(project.id.as_str().to_string(), record);
                }
            }
        }
        by_id.into_values().collect()
    }
}
