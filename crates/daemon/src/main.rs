// cutsyncd: standalone snapshot sync daemon.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use cutsync_daemon::config::{default_data_dir, DaemonConfig, DataDirs};
use cutsync_daemon::runtime::SyncRuntime;

#[derive(Debug, Parser)]
#[command(name = "cutsyncd", about = "Cutsync snapshot synchronization daemon")]
struct Args {
    /// Data directory (defaults to ~/.cutsync).
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Listen address override (defaults to the configured value).
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let root = match args.data_dir {
        Some(dir) => dir,
        None => default_data_dir().context("could not determine home directory")?,
    };

    let dirs = DataDirs::new(&root);
    dirs.ensure().context("failed to prepare data directories")?;

    let mut config = DaemonConfig::load(&dirs.config_file);
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }

    info!(data_dir = %root.display(), listen = %config.listen_addr, "starting cutsync daemon");
    let runtime = SyncRuntime::new(dirs, config)?;
    runtime.run().await.context("sync daemon terminated unexpectedly")
}
