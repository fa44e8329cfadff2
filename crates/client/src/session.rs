// One editor session bound to one project.
//
// The session owns the local document and arbitrates every incoming sync
// event against it. Incoming snapshots for another project (or a deleted
// one) are discarded whole. For matching snapshots, assets and project
// metadata always apply; tracks apply only when the anti-clobber rule
// allows, and local placeholder tracks are folded back in.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use cutsync_common::fingerprint::{
    decide_track_apply, track_fingerprint, ApplyDecision, Fingerprint,
};
use cutsync_common::protocol::{PendingEdit, SyncEvent};
use cutsync_common::types::{ProjectId, Snapshot, Track};

use crate::edits::{apply_edit, EditError};
use crate::placeholder::reconcile_placeholders;

/// What the host application should do after an event was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSignal {
    /// Nothing changed.
    None,
    /// The local document changed; re-render.
    Updated,
    /// A queued edit was applied; acknowledge `edit_id` to the daemon.
    EditApplied { edit_id: String },
    /// This session's project was deleted; leave the editor.
    Detached { redirect_to: Option<String> },
    /// The project list changed; re-fetch it.
    RefreshProjects,
    /// Full reload requested.
    Reload,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    Applied { tracks_replaced: bool },
    DiscardedForeign { incoming: ProjectId },
    DiscardedDeleted,
}

#[derive(Debug)]
pub struct Session {
    project_id: ProjectId,
    snapshot: Option<Snapshot>,
    /// Fingerprint of the last track state the daemon has seen from us (or
    /// we accepted from it). Divergence from it means unflushed local edits.
    last_acked: Fingerprint,
    applied_edits: HashSet<String>,
}

impl Session {
    pub fn new(project_id: ProjectId) -> Self {
        let last_acked = track_fingerprint(&project_id, &[]);
        Self { project_id, snapshot: None, last_acked, applied_edits: HashSet::new() }
    }

    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn tracks(&self) -> &[Track] {
        self.snapshot.as_ref().map(|s| s.tracks.as_slice()).unwrap_or_default()
    }

    /// Mutate the local document (a user edit). The change stays local
    /// until reported; the anti-clobber rule protects it meanwhile.
    pub fn edit_local(&mut self, edit: impl FnOnce(&mut Snapshot)) {
        if let Some(snapshot) = self.snapshot.as_mut() {
            edit(snapshot);
        }
    }

    /// Record that the current local state was reported to the daemon.
    pub fn mark_reported(&mut self) {
        self.last_acked = track_fingerprint(&self.project_id, self.tracks());
    }

    /// The `updateSnapshot` payload for reporting local state. Placeholder
    /// tracks stay local; they must never reach the store or the archive.
    /// `None` when no document is loaded.
    pub fn report_payload(&self) -> Option<serde_json::Value> {
        let snapshot = self.snapshot.as_ref()?;
        let mut reported = snapshot.clone();
        reported.tracks.retain(|track| !track.is_placeholder());
        serde_json::to_value(&reported).ok()
    }

    /// Reconcile an incoming snapshot push into the local document.
    pub fn apply_remote(&mut self, incoming: Snapshot) -> ApplyOutcome {
        if incoming.project.id.is_deleted_sentinel() {
            warn!(incoming = %incoming.project.id, "discarding push for deleted project");
            return ApplyOutcome::DiscardedDeleted;
        }
        if incoming.project.id != self.project_id {
            debug!(
                ours = %self.project_id,
                incoming = %incoming.project.id,
                "discarding push for another project"
            );
            return ApplyOutcome::DiscardedForeign { incoming: incoming.project.id };
        }

        let Some(local) = self.snapshot.as_mut() else {
            let mut adopted = incoming;
            adopted.tracks = reconcile_placeholders(&[], adopted.tracks);
            self.last_acked = track_fingerprint(&self.project_id, &adopted.tracks);
            self.snapshot = Some(adopted);
            return ApplyOutcome::Applied { tracks_replaced: true };
        };

        // Assets and project metadata first: media elements arriving in the
        // track set must find their assets already present.
        local.assets = incoming.assets;
        local.project = incoming.project;

        let decision =
            decide_track_apply(&self.project_id, &local.tracks, &self.last_acked, &incoming.tracks);
        let tracks_replaced = match decision {
            ApplyDecision::Apply => {
                local.tracks = reconcile_placeholders(&local.tracks, incoming.tracks);
                self.last_acked = track_fingerprint(&self.project_id, &local.tracks);
                true
            }
            ApplyDecision::SkipTracks => {
                info!("keeping local tracks over incoming push, unreported edits present");
                false
            }
        };
        ApplyOutcome::Applied { tracks_replaced }
    }

    /// Apply a queued automation edit, once. Returns whether the document
    /// changed (`false` for replays of an already-applied edit id).
    pub fn apply_pending(&mut self, edit: &PendingEdit) -> Result<bool, EditError> {
        if self.applied_edits.contains(&edit.id) {
            debug!(edit = %edit.id, "skipping already-applied edit");
            return Ok(false);
        }
        let Some(snapshot) = self.snapshot.as_mut() else {
            warn!(edit = %edit.id, "no document loaded, dropping edit");
            return Ok(false);
        };
        apply_edit(snapshot, edit)?;
        self.applied_edits.insert(edit.id.clone());
        Ok(true)
    }

    /// Handle one decoded sync event.
    pub fn handle_event(&mut self, event: SyncEvent) -> SessionSignal {
        match event {
            SyncEvent::SnapshotUpdate(snapshot) => match self.apply_remote(*snapshot) {
                ApplyOutcome::Applied { .. } => SessionSignal::Updated,
                _ => SessionSignal::None,
            },
            SyncEvent::Edit(edit) => match self.apply_pending(&edit) {
                Ok(true) => SessionSignal::EditApplied { edit_id: edit.id },
                Ok(false) => SessionSignal::None,
                Err(error) => {
                    warn!(?error, edit = %edit.id, "failed to apply queued edit");
                    SessionSignal::None
                }
            },
            SyncEvent::RefreshProjects { .. } => SessionSignal::RefreshProjects,
            SyncEvent::ProjectDeleted { project_id, redirect_to } => {
                if project_id == self.project_id {
                    self.snapshot = None;
                    SessionSignal::Detached { redirect_to }
                } else {
                    SessionSignal::RefreshProjects
                }
            }
            SyncEvent::ForceRefresh { .. } => SessionSignal::Reload,
        }
    }

    /// Handle a raw SSE frame. Undecodable frames are logged and dropped;
    /// a malformed event must never tear down the session.
    pub fn handle_raw(&mut self, event_name: &str, data: &str) -> SessionSignal {
        match SyncEvent::parse(event_name, data) {
            Ok(event) => self.handle_event(event),
            Err(error) => {
                warn!(?error, event = %event_name, "dropping undecodable sync event");
                SessionSignal::None
            }
        }
    }
}
