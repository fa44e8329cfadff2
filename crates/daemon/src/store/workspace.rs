// The live workspace document and its bounded backup history.
//
// Exactly one project is "open" at a time; its full document lives at
// `workspace/snapshot.json`. Every write first copies the current document
// into `workspace/history/` (pruned beyond the retention bound) and then
// atomically replaces the file via temp-file + rename. Writes never merge;
// callers read-modify-write.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use cutsync_common::types::{ProjectId, Snapshot};

const HISTORY_PREFIX: &str = "snapshot_";
const HISTORY_EXT: &str = "json";

#[derive(Debug, Clone)]
pub struct WorkspaceStore {
    snapshot_file: PathBuf,
    history_dir: PathBuf,
    retention: usize,
}

impl WorkspaceStore {
    pub fn new(
        snapshot_file: impl Into<PathBuf>,
        history_dir: impl Into<PathBuf>,
        retention: usize,
    ) -> Result<Self> {
        let history_dir = history_dir.into();
        fs::create_dir_all(&history_dir).with_context(|| {
            format!("failed to create history directory `{}`", history_dir.display())
        })?;
        Ok(Self { snapshot_file: snapshot_file.into(), history_dir, retention })
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_file
    }

    /// Read the persisted document. Missing or unparsable content reads as
    /// not found; corruption is recovered by falling back to the archive,
    /// never propagated.
    pub fn read(&self) -> Option<Snapshot> {
        let raw = self.read_raw()?;
        match serde_json::from_value(raw) {
            Ok(snapshot) => Some(snapshot),
            Err(error) => {
                warn!(?error, "workspace document did not decode as a snapshot");
                None
            }
        }
    }

    /// Read the persisted document as raw JSON (partial documents written
    /// by automation may not decode into a full `Snapshot`).
    pub fn read_raw(&self) -> Option<Value> {
        let contents = match fs::read_to_string(&self.snapshot_file) {
            Ok(contents) => contents,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return None,
            Err(error) => {
                warn!(?error, path = %self.snapshot_file.display(), "failed to read workspace document");
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(error) => {
                warn!(?error, "workspace document is corrupt, treating as not found");
                None
            }
        }
    }

    /// The project id embedded in the persisted document, if any.
    pub fn project_id(&self) -> Option<ProjectId> {
        let raw = self.read_raw()?;
        raw.get("project")
            .and_then(|p| p.get("id"))
            .and_then(Value::as_str)
            .map(ProjectId::from)
    }

    /// Backup the current document into history, then atomically replace it.
    /// Backup + replace is one critical section per project scope; callers
    /// hold the project lock.
    pub fn write(&self, snapshot: &Snapshot) -> Result<()> {
        let value = serde_json::to_value(snapshot).context("failed to encode snapshot")?;
        self.write_value(&value)
    }

    /// Raw-JSON variant of [`write`](Self::write), used by merge writes.
    pub fn write_value(&self, value: &Value) -> Result<()> {
        self.backup()?;
        let encoded =
            serde_json::to_vec_pretty(value).context("failed to encode workspace document")?;

        let tmp_path = self.temp_path();
        let mut file = fs::File::create(&tmp_path)
            .with_context(|| format!("failed to create temp file `{}`", tmp_path.display()))?;
        file.write_all(&encoded).context("failed to write workspace document")?;
        file.sync_data().context("failed to fsync workspace document")?;
        drop(file);

        fs::rename(&tmp_path, &self.snapshot_file).with_context(|| {
            format!(
                "failed to atomically move `{}` to `{}`",
                tmp_path.display(),
                self.snapshot_file.display()
            )
        })?;
        debug!(path = %self.snapshot_file.display(), "workspace document replaced");
        Ok(())
    }

    /// Copy the current persisted document into history and prune old
    /// entries beyond the retention bound. A missing document is a no-op.
    pub fn backup(&self) -> Result<()> {
        if !self.snapshot_file.exists() {
            return Ok(());
        }
        // Nanosecond precision keeps rapid consecutive backups distinct.
        let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%S%.9f");
        let backup_path =
            self.history_dir.join(format!("{HISTORY_PREFIX}{stamp}.{HISTORY_EXT}"));
        fs::copy(&self.snapshot_file, &backup_path).with_context(|| {
            format!("failed to back up workspace document to `{}`", backup_path.display())
        })?;

        for stale in self.history_entries()?.into_iter().skip(self.retention) {
            if let Err(error) = fs::remove_file(&stale) {
                warn!(?error, path = %stale.display(), "failed to prune history entry");
            }
        }
        Ok(())
    }

    /// History entries, newest first.
    pub fn history_entries(&self) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.history_dir).with_context(|| {
            format!("failed to read history directory `{}`", self.history_dir.display())
        })? {
            let path = entry.context("failed to read history entry")?.path();
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if name.starts_with(HISTORY_PREFIX) && name.ends_with(HISTORY_EXT) {
                entries.push(path);
            }
        }
        entries.sort();
        entries.reverse();
        Ok(entries)
    }

    /// Remove the live document (project deleted or retired). History is
    /// kept.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.snapshot_file) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error).with_context(|| {
                format!("failed to remove workspace document `{}`", self.snapshot_file.display())
            }),
        }
    }

    /// Modification time of the persisted document.
    pub fn mtime(&self) -> Option<SystemTime> {
        fs::metadata(&self.snapshot_file).and_then(|m| m.modified()).ok()
    }

    fn temp_path(&self) -> PathBuf {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        self.snapshot_file.with_extension(format!("tmp.{nonce}"))
    }
}
