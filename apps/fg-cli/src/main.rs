//! # fg-cli
//!
//! Command-line interface for Feedgate.
//!
//! Works on the same state directory the page runtime reads:
//! - `fg decide` — check URLs or paths against the current policy
//! - `fg sections show/set` — view or replace the permanent allowlist
//! - `fg grant start/status/confirm/list` — negotiate temporary grants

mod commands;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fg_page::FeedgateConfig;
use fg_policy::{JsonFileStorage, KeyValueStore, PolicyStore, SystemClock};

/// Feedgate CLI: inspect and edit the section allowlist.
#[derive(Parser)]
#[command(name = "fg", version, about)]
struct Cli {
    /// Path to feedgate.toml (defaults to <state-dir>/feedgate.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding sync.json and local.json.
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide URLs or paths against the current policy.
    Decide {
        /// Absolute URLs or site paths (e.g. /r/all).
        #[arg(required = true)]
        targets: Vec<String>,
        /// Show every check the engine ran.
        #[arg(long)]
        explain: bool,
        /// Print machine-readable JSON.
        #[arg(long)]
        json: bool,
    },
    /// View or replace the permanent section allowlist.
    Sections {
        #[command(subcommand)]
        command: commands::sections::SectionsCommands,
    },
    /// Negotiate temporary section grants.
    Grant {
        #[command(subcommand)]
        command: commands::grant::GrantCommands,
    },
}

/// Everything a command needs: parsed config and the shared storage.
pub struct Context {
    pub config: FeedgateConfig,
    pub state_dir: PathBuf,
    pub storage: Arc<dyn KeyValueStore>,
}

impl Context {
    pub fn open(config_path: Option<&Path>, state_dir: Option<&Path>) -> anyhow::Result<Self> {
        let state_dir = match state_dir {
            Some(dir) => dir.to_path_buf(),
            None => dirs::config_dir()
                .context("no platform config directory; pass --state-dir")?
                .join("feedgate"),
        };
        let config = match config_path {
            Some(path) => FeedgateConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => FeedgateConfig::load_or_default(&state_dir.join("feedgate.toml")),
        };
        let storage = JsonFileStorage::new(&state_dir)
            .with_context(|| format!("opening state directory {}", state_dir.display()))?;
        Ok(Self {
            config,
            state_dir,
            storage: Arc::new(storage),
        })
    }

    /// A policy store over the shared storage, loaded.
    pub async fn policy_store(&self) -> Arc<PolicyStore> {
        let store = Arc::new(PolicyStore::new(
            self.config.policy.clone(),
            Some(Arc::clone(&self.storage)),
            Arc::new(SystemClock),
        ));
        store.refresh().await;
        store
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so command output on stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("fg_policy=info".parse()?)
                .add_directive("fg_page=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let ctx = Context::open(cli.config.as_deref(), cli.state_dir.as_deref())?;
    tracing::debug!(state_dir = %ctx.state_dir.display(), "using state directory");

    match &cli.command {
        Commands::Decide {
            targets,
            explain,
            json,
        } => commands::decide::execute(&ctx, targets, *explain, *json).await,
        Commands::Sections { command } => commands::sections::execute(command, &ctx).await,
        Commands::Grant { command } => commands::grant::execute(command, &ctx).await,
    }
}
