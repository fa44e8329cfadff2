// cutsync: command-line client for the sync daemon.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Debug, Parser)]
#[command(name = "cutsync", about = "Cutsync snapshot synchronization client")]
struct Cli {
    /// Daemon base URL.
    #[arg(long, default_value = "http://127.0.0.1:8791")]
    server: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the current snapshot, or a stored project's snapshot.
    Snapshot {
        /// Project id or name (omit for the open workspace document).
        project: Option<String>,
    },
    /// List archived projects.
    Projects,
    /// Open a project in the workspace, archiving the current one.
    Switch { project: String },
    /// Archive the open project.
    Archive {
        /// Archive right now instead of waiting for the quiet window.
        #[arg(long)]
        immediate: bool,
    },
    /// Delete a project from the archive (and the workspace, if open).
    Delete { project: String },
    /// Push a snapshot JSON file into the workspace.
    Push {
        file: PathBuf,
        /// Replace project and tracks wholesale instead of merging.
        #[arg(long)]
        replace: bool,
    },
    /// Queue an automation edit for connected editors.
    Edit {
        /// Edit action, e.g. addSubtitle, addText, clearSubtitles.
        action: String,
        /// JSON payload for the edit.
        #[arg(long, default_value = "{}")]
        data: String,
    },
    /// Show queued edits awaiting a client.
    Edits,
    /// Mark queued edits as processed.
    Ack { ids: Vec<String> },
}

struct Api {
    base: String,
    http: reqwest::Client,
}

impl Api {
    fn new(base: String) -> Self {
        Self { base, http: reqwest::Client::new() }
    }

    async fn query(&self, params: &[(&str, &str)]) -> Result<Value> {
        let response = self
            .http
            .get(format!("{}/api/edit", self.base))
            .query(params)
            .send()
            .await
            .with_context(|| format!("failed to reach daemon at {}", self.base))?;
        Self::envelope(response).await
    }

    async fn ingest(&self, action: &str, data: Value) -> Result<Value> {
        let response = self
            .http
            .post(format!("{}/api/edit", self.base))
            .json(&json!({ "action": action, "data": data }))
            .send()
            .await
            .with_context(|| format!("failed to reach daemon at {}", self.base))?;
        Self::envelope(response).await
    }

    async fn envelope(response: reqwest::Response) -> Result<Value> {
        let body: Value = response.json().await.context("daemon returned a non-JSON body")?;
        if body.get("success").and_then(Value::as_bool) != Some(true) {
            let error = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("daemon reported failure");
            bail!("{error}");
        }
        Ok(body)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let api = Api::new(cli.server.trim_end_matches('/').to_string());

    match cli.command {
        Command::Snapshot { project } => {
            let mut params = vec![("action", "getSnapshot")];
            if let Some(project) = project.as_deref() {
                params.push(("project", project));
            }
            let body = api.query(&params).await?;
            println!("{}", serde_json::to_string_pretty(&body["snapshot"])?);
        }
        Command::Projects => {
            let body = api.query(&[("action", "listProjects")]).await?;
            let projects = body["projects"].as_array().cloned().unwrap_or_default();
            if projects.is_empty() {
                println!("no archived projects");
            }
            for project in projects {
                println!(
                    "{}  {}  ({})",
                    project["id"].as_str().unwrap_or("?"),
                    project["name"].as_str().unwrap_or("?"),
                    project["folderName"].as_str().unwrap_or("?"),
                );
            }
        }
        Command::Switch { project } => {
            let body = api.ingest("switchProject", json!({ "projectId": project })).await?;
            println!(
                "switched to {}",
                body["snapshot"]["project"]["name"].as_str().unwrap_or(&project)
            );
        }
        Command::Archive { immediate } => {
            let body = api.ingest("archiveProject", json!({ "immediate": immediate })).await?;
            println!("{}", body["message"].as_str().unwrap_or("ok"));
        }
        Command::Delete { project } => {
            let body = api.ingest("deleteProject", json!({ "projectId": project })).await?;
            println!(
                "deleted {} (folder {})",
                project,
                body["folder"].as_str().unwrap_or("?")
            );
        }
        Command::Push { file, replace } => {
            let contents = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read `{}`", file.display()))?;
            let document: Value = serde_json::from_str(&contents)
                .with_context(|| format!("`{}` is not valid JSON", file.display()))?;
            let action = if replace { "saveSnapshot" } else { "updateSnapshot" };
            let body = api.ingest(action, document).await?;
            println!("{}", body["message"].as_str().unwrap_or("ok"));
        }
        Command::Edit { action, data } => {
            let data: Value =
                serde_json::from_str(&data).context("--data is not valid JSON")?;
            let body = api.ingest(&action, data).await?;
            println!(
                "queued {}",
                body["editId"].as_str().unwrap_or("edit")
            );
        }
        Command::Edits => {
            let body = api.query(&[("action", "getPendingEdits")]).await?;
            let edits = body["edits"].as_array().cloned().unwrap_or_default();
            if edits.is_empty() {
                println!("no pending edits");
            }
            for edit in edits {
                println!(
                    "{}  {}  {}",
                    edit["id"].as_str().unwrap_or("?"),
                    edit["action"].as_str().unwrap_or("?"),
                    edit["data"],
                );
            }
        }
        Command::Ack { ids } => {
            if ids.is_empty() {
                bail!("provide at least one edit id");
            }
            let body = api.ingest("markProcessed", json!({ "ids": ids })).await?;
            println!("acknowledged {}", body["processed"]);
        }
    }
    Ok(())
}
