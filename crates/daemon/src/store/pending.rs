// File-backed queue of automation edits awaiting pickup by a client.
//
// Edits land here when no editor is connected (or as a durable fallback);
// clients poll the queue, apply what they can, and report processed ids
// back. Processed entries are kept (bounded) for observability.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, warn};

use cutsync_common::protocol::PendingEdit;

#[derive(Debug, Clone)]
pub struct PendingEditQueue {
    file: PathBuf,
    retention: usize,
}

impl PendingEditQueue {
    pub fn new(file: impl Into<PathBuf>, retention: usize) -> Self {
        Self { file: file.into(), retention }
    }

    /// All queued edits, oldest first. Missing or corrupt files read as
    /// empty; entries that don't decode are dropped individually.
    pub fn load(&self) -> Vec<PendingEdit> {
        let contents = match fs::read_to_string(&self.file) {
            Ok(contents) => contents,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(error) => {
                warn!(?error, path = %self.file.display(), "failed to read pending edits");
                return Vec::new();
            }
        };
        let raw: Vec<Value> = match serde_json::from_str(&contents) {
            Ok(raw) => raw,
            Err(error) => {
                warn!(?error, "pending edits file is corrupt, treating as empty");
                return Vec::new();
            }
        };
        raw.into_iter()
            .filter_map(|entry| match serde_json::from_value::<PendingEdit>(entry) {
                Ok(edit) => Some(edit),
                Err(error) => {
                    warn!(?error, "dropping malformed pending edit");
                    None
                }
            })
            .collect()
    }

    /// Edits not yet acknowledged by a client.
    pub fn unprocessed(&self) -> Vec<PendingEdit> {
        self.load().into_iter().filter(|e| !e.processed).collect()
    }

    /// Append an edit, keeping only the newest entries within retention.
    pub fn append(&self, edit: PendingEdit) -> Result<()> {
        let mut edits = self.load();
        edits.push(edit);
        let overflow = edits.len().saturating_sub(self.retention);
        if overflow > 0 {
            edits.drain(..overflow);
        }
        self.save(&edits)
    }

    /// Mark the given edit ids processed. Returns how many entries changed.
    pub fn mark_processed(&self, ids: &[String]) -> Result<usize> {
        let mut edits = self.load();
        let mut changed = 0;
        for edit in &mut edits {
            if !edit.processed && ids.iter().any(|id| id == &edit.id) {
                edit.processed = true;
                changed += 1;
            }
        }
        if changed > 0 {
            self.save(&edits)?;
        }
        debug!(changed, "marked pending edits processed");
        Ok(changed)
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.file) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error).with_context(|| {
                format!("failed to remove pending edits `{}`", self.file.display())
            }),
        }
    }

    fn save(&self, edits: &[PendingEdit]) -> Result<()> {
        let encoded =
            serde_json::to_vec_pretty(edits).context("failed to encode pending edits")?;
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let tmp_path = self.file.with_extension(format!("tmp.{nonce}"));
        let mut file = fs::File::create(&tmp_path)
            .with_context(|| format!("failed to create temp file `{}`", tmp_path.display()))?;
        file.write_all(&encoded).context("failed to write pending edits")?;
        file.sync_data().context("failed to fsync pending edits")?;
        drop(file);
        fs::rename(&tmp_path, &self.file).with_context(|| {
            format!("failed to atomically replace `{}`", self.file.display())
        })
    }
}
