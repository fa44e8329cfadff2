// Local configuration and on-disk layout for the sync daemon.
//
// Config file: `<data-dir>/config.toml`
// Data layout:
//   <data-dir>/workspace/snapshot.json        live document
//   <data-dir>/workspace/history/             timestamped backups
//   <data-dir>/workspace/pending-edits.json   queued automation edits
//   <data-dir>/projects/<folder>/snapshot.json
//   <data-dir>/projects/project_ids.json      folder name -> internal id

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Root directory for Cutsync state: `~/.cutsync/`.
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".cutsync"))
}

/// Daemon configuration at `<data-dir>/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Address the HTTP/SSE API binds to.
    pub listen_addr: String,
    /// Quiet window before a scheduled archive fires.
    pub archive_debounce_ms: u64,
    /// Number of workspace backups kept in history.
    pub history_retention: usize,
    /// Number of queued edits kept after processing.
    pub pending_edit_retention: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8791".to_string(),
            archive_debounce_ms: 2_000,
            history_retention: 20,
            pending_edit_retention: 100,
        }
    }
}

impl DaemonConfig {
    /// Load from a config file. Returns defaults if the file doesn't exist
    /// or can't be parsed.
    pub fn load(path: &Path) -> Self {
        Self::load_from(path).unwrap_or_default()
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config `{}`", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config `{}`", path.display()))
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create config directory `{}`", parent.display())
            })?;
        }
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write config `{}`", path.display()))
    }
}

/// Resolved filesystem layout under one data directory.
#[derive(Debug, Clone)]
pub struct DataDirs {
    pub root: PathBuf,
    pub config_file: PathBuf,
    pub workspace_dir: PathBuf,
    pub snapshot_file: PathBuf,
    pub history_dir: PathBuf,
    pub pending_edits_file: PathBuf,
    pub projects_dir: PathBuf,
    pub id_map_file: PathBuf,
}

impl DataDirs {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let workspace_dir = root.join("workspace");
        let projects_dir = root.join("projects");
        Self {
            config_file: root.join("config.toml"),
            snapshot_file: workspace_dir.join("snapshot.json"),
            history_dir: workspace_dir.join("history"),
            pending_edits_file: workspace_dir.join("pending-edits.json"),
            id_map_file: projects_dir.join("project_ids.json"),
            workspace_dir,
            projects_dir,
            root,
        }
    }

    /// Create every directory the daemon writes into.
    pub fn ensure(&self) -> Result<()> {
        for dir in [&self.workspace_dir, &self.history_dir, &self.projects_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory `{}`", dir.display()))?;
        }
        Ok(())
    }
}
