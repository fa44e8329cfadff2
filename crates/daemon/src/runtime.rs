// Runtime wiring: stores, debounced archiver, filesystem watcher, HTTP/SSE
// surface, and the per-project locking that keeps archive-vs-write races
// ordered.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use cutsync_common::merge::{merge_update, overlay_sections};
use cutsync_common::protocol::{PendingEdit, ProjectEntry, SyncEvent};
use cutsync_common::types::{ProjectId, Snapshot};

use crate::archiver::Archiver;
use crate::config::{DaemonConfig, DataDirs};
use crate::hub::SyncHub;
use crate::rpc;
use crate::store::archive::{ArchiveOutcome, ProjectArchive};
use crate::store::pending::PendingEditQueue;
use crate::store::resolver::{self, Resolution};
use crate::store::workspace::WorkspaceStore;
use crate::watcher::{WatchSignal, WorkspaceWatcher};

/// Result of a delete request. `folder` is the archive folder that was
/// removed; `None` when the project only existed in the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted { folder: Option<String> },
    NotFound,
}

/// Shared daemon state. All mutation paths that touch a project's files
/// hold that project's lock: backup + replace + archive stay ordered even
/// when the debounced archive fires mid-write.
pub struct SyncState {
    pub config: DaemonConfig,
    pub workspace: WorkspaceStore,
    pub archive: ProjectArchive,
    pub pending: PendingEditQueue,
    pub archiver: Archiver,
    pub hub: SyncHub,
    locks: StdMutex<HashMap<ProjectId, Arc<AsyncMutex<()>>>>,
    /// Edit ids already broadcast, so the watcher doesn't re-announce edits
    /// this process queued itself.
    announced_edits: StdMutex<HashSet<String>>,
}

impl SyncState {
    pub fn new(dirs: &DataDirs, config: DaemonConfig) -> Result<Self> {
        let workspace = WorkspaceStore::new(
            &dirs.snapshot_file,
            &dirs.history_dir,
            config.history_retention,
        )?;
        let archive = ProjectArchive::new(&dirs.projects_dir, &dirs.id_map_file)?;
        let pending = PendingEditQueue::new(&dirs.pending_edits_file, config.pending_edit_retention);
        let archiver = Archiver::new(Duration::from_millis(config.archive_debounce_ms));
        Ok(Self {
            config,
            workspace,
            archive,
            pending,
            archiver,
            hub: SyncHub::new(),
            locks: StdMutex::new(HashMap::new()),
            announced_edits: StdMutex::new(HashSet::new()),
        })
    }

    fn project_lock(&self, project: &ProjectId) -> Arc<AsyncMutex<()>> {
        self.locks.lock().unwrap().entry(project.clone()).or_default().clone()
    }

    /// Merge an update payload into the workspace document and broadcast
    /// the result. Rejects writes addressed to a deleted-sentinel id.
    pub async fn update_snapshot(&self, update: Value) -> Result<Value> {
        self.write_workspace(update, false).await
    }

    /// Full-section save: project and tracks replace, assets carry over.
    pub async fn save_snapshot(&self, update: Value) -> Result<Value> {
        self.write_workspace(update, true).await
    }

    async fn write_workspace(&self, update: Value, replace_sections: bool) -> Result<Value> {
        let project = update
            .get("project")
            .and_then(|p| p.get("id"))
            .and_then(Value::as_str)
            .map(ProjectId::from)
            .or_else(|| self.workspace.project_id())
            .context("update carries no project id and the workspace is empty")?;
        if project.is_deleted_sentinel() {
            anyhow::bail!("refusing to write to deleted project `{project}`");
        }

        let lock = self.project_lock(&project);
        let _guard = lock.lock().await;

        let existing = self.workspace.read_raw();
        let mut merged = if replace_sections {
            overlay_sections(existing.as_ref(), &update)
        } else {
            merge_update(existing.as_ref(), &update)
        };
        if let Some(project_obj) = merged.get_mut("project").and_then(Value::as_object_mut) {
            project_obj.insert("updatedAt".to_string(), json!(Utc::now()));
        }
        self.workspace.write_value(&merged)?;
        self.archiver.schedule(project.clone());
        self.publish_document(&merged);
        Ok(merged)
    }

    /// Archive the current workspace document right now, cancelling any
    /// pending debounced archive for the same project.
    pub async fn archive_now(&self) -> Result<ArchiveOutcome> {
        let Some(project) = self.workspace.project_id() else {
            return self.archive.archive(&self.workspace);
        };
        let lock = self.project_lock(&project);
        let _guard = lock.lock().await;
        self.archiver.cancel(&project);
        self.archive.archive(&self.workspace)
    }

    /// Schedule a debounced archive for whatever project is open.
    pub fn request_archive(&self) -> bool {
        match self.workspace.project_id() {
            Some(project) if !project.is_deleted_sentinel() => {
                self.archiver.schedule(project);
                true
            }
            _ => false,
        }
    }

    /// Open a project in the workspace: archive the one currently open,
    /// load the freshest stored copy (or synthesize a clean document), and
    /// broadcast the switch.
    pub async fn switch_project(&self, id_or_name: &str) -> Result<Snapshot> {
        if let Some(current) = self.workspace.project_id() {
            if current.as_str() != id_or_name && !current.is_deleted_sentinel() {
                let lock = self.project_lock(&current);
                let _guard = lock.lock().await;
                self.archiver.cancel(&current);
                self.archive.archive(&self.workspace)?;
            }
        }

        let snapshot = match resolver::resolve(&self.workspace, &self.archive, id_or_name) {
            Some(resolution) => resolution.snapshot,
            None => {
                info!(project = %id_or_name, "no stored document, creating a fresh one");
                Snapshot::default_for(ProjectId::new(id_or_name), Utc::now())
            }
        };

        let project = snapshot.project.id.clone();
        let lock = self.project_lock(&project);
        let _guard = lock.lock().await;
        self.workspace.write(&snapshot)?;
        self.archiver.schedule(project.clone());
        self.hub.publish(SyncEvent::SnapshotUpdate(Box::new(snapshot.clone())));
        self.hub.publish(SyncEvent::RefreshProjects { project_id: Some(project) });
        Ok(snapshot)
    }

    /// Remove a project from the archive and, if it is the one open in the
    /// workspace, clear the workspace so the debounced archive cannot
    /// resurrect it. A project that only ever lived in the workspace (never
    /// archived) deletes the same way; sessions hear `ProjectDeleted` either
    /// way.
    pub async fn delete_project(&self, id_or_name: &str) -> Result<DeleteOutcome> {
        let internal = self
            .archive
            .read(id_or_name)
            .map(|(_, snapshot)| snapshot.project.id)
            .or_else(|| {
                self.workspace.read().map(|s| s.project).and_then(|p| {
                    (p.id.as_str() == id_or_name || p.name == id_or_name).then_some(p.id)
                })
            })
            .unwrap_or_else(|| ProjectId::new(id_or_name));

        let lock = self.project_lock(&internal);
        let _guard = lock.lock().await;
        self.archiver.cancel(&internal);

        let folder = self.archive.delete(id_or_name)?;
        let was_live = self.workspace.project_id().as_ref() == Some(&internal);
        if folder.is_none() && !was_live {
            return Ok(DeleteOutcome::NotFound);
        }
        if was_live {
            self.workspace.clear()?;
        }

        self.hub.publish(SyncEvent::ProjectDeleted {
            project_id: internal,
            redirect_to: Some("/projects".to_string()),
        });
        self.hub.publish(SyncEvent::RefreshProjects { project_id: None });
        Ok(DeleteOutcome::Deleted { folder })
    }

    /// Read-only lookup of the freshest document for a project.
    pub fn load_project(&self, id_or_name: &str) -> Option<Resolution> {
        resolver::resolve(&self.workspace, &self.archive, id_or_name)
    }

    pub fn current_document(&self) -> Option<Value> {
        self.workspace.read_raw()
    }

    pub fn list_projects(&self) -> Vec<ProjectEntry> {
        self.archive.list_projects()
    }

    /// Queue an automation edit and broadcast it to connected sessions.
    pub fn queue_edit(&self, action: &str, data: Value) -> Result<PendingEdit> {
        let edit = PendingEdit::new(action, data);
        self.announced_edits.lock().unwrap().insert(edit.id.clone());
        self.pending.append(edit.clone())?;
        self.hub.publish(SyncEvent::Edit(edit.clone()));
        Ok(edit)
    }

    pub fn force_refresh(&self) {
        self.hub.publish(SyncEvent::ForceRefresh { timestamp: Utc::now().timestamp_millis() });
    }

    /// React to an external write observed by the filesystem watcher.
    pub fn handle_watch_signal(&self, signal: WatchSignal) {
        match signal {
            WatchSignal::SnapshotChanged => {
                let Some(raw) = self.workspace.read_raw() else { return };
                if self.request_archive() {
                    self.publish_document(&raw);
                }
            }
            WatchSignal::PendingEditsChanged => {
                let edits = self.pending.load();
                let mut announced = self.announced_edits.lock().unwrap();
                // Forget ids no longer in the file so the set stays bounded.
                announced.retain(|id| edits.iter().any(|e| &e.id == id));
                for edit in edits.into_iter().filter(|e| !e.processed) {
                    if announced.insert(edit.id.clone()) {
                        self.hub.publish(SyncEvent::Edit(edit));
                    }
                }
            }
        }
    }

    /// Archive one project when its debounce deadline fires. Skips quietly
    /// when the workspace has moved on to another project since scheduling.
    pub async fn archive_deadline_fired(&self, project: ProjectId) {
        let lock = self.project_lock(&project);
        let _guard = lock.lock().await;
        if self.workspace.project_id().as_ref() != Some(&project) {
            debug!(project = %project, "workspace moved on, dropping stale archive");
            return;
        }
        match self.archive.archive(&self.workspace) {
            Ok(ArchiveOutcome::Archived { folder }) => {
                debug!(project = %project, folder = %folder, "debounced archive completed");
            }
            Ok(ArchiveOutcome::Skipped(reason)) => {
                debug!(project = %project, ?reason, "debounced archive skipped");
            }
            Err(error) => warn!(?error, project = %project, "debounced archive failed"),
        }
    }

    fn publish_document(&self, raw: &Value) {
        match serde_json::from_value::<Snapshot>(raw.clone()) {
            Ok(snapshot) => self.hub.publish(SyncEvent::SnapshotUpdate(Box::new(snapshot))),
            Err(error) => {
                debug!(?error, "workspace document is partial, not broadcasting")
            }
        }
    }

    /// Drive the debounced archiver until the state is dropped.
    pub async fn run_archiver(self: Arc<Self>) {
        loop {
            match self.archiver.next_deadline() {
                Some(deadline) => {
                    let sleep = tokio::time::sleep_until(deadline);
                    tokio::select! {
                        _ = sleep => {
                            for project in self.archiver.drain_ready() {
                                self.archive_deadline_fired(project).await;
                            }
                        }
                        _ = self.archiver.changed() => {}
                    }
                }
                None => self.archiver.changed().await,
            }
        }
    }
}

pub struct SyncRuntime {
    state: Arc<SyncState>,
    workspace_dir: std::path::PathBuf,
}

impl SyncRuntime {
    pub fn new(dirs: DataDirs, config: DaemonConfig) -> Result<Self> {
        let state = Arc::new(SyncState::new(&dirs, config)?);
        Ok(Self { state, workspace_dir: dirs.workspace_dir })
    }

    pub fn state(&self) -> Arc<SyncState> {
        self.state.clone()
    }

    /// Run until ctrl-c: archiver loop, workspace watcher, and the HTTP/SSE
    /// listener.
    pub async fn run(self) -> Result<()> {
        tokio::spawn(self.state.clone().run_archiver());

        let mut watcher = WorkspaceWatcher::spawn(&self.workspace_dir)?;
        let watch_state = self.state.clone();
        tokio::spawn(async move {
            while let Some(signal) = watcher.recv().await {
                watch_state.handle_watch_signal(signal);
            }
        });

        let listener = tokio::net::TcpListener::bind(&self.state.config.listen_addr)
            .await
            .with_context(|| format!("failed to bind `{}`", self.state.config.listen_addr))?;
        info!(addr = %self.state.config.listen_addr, "listening");
        axum::serve(listener, rpc::router(self.state.clone()))
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                info!("shutting down");
            })
            .await
            .context("http server failed")
    }
}
