//! runpanel - inspect and drive the running-items panel of a workspace.
//!
//! Loads a TOML workspace description (open tabs, compute sessions), wires
//! the provider registry over in-memory collaborators, and prints the
//! panel as JSON on stdout. Logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser as ClapParser, Subcommand};
use runpanel::{
    config::{self, ConfigError, WorkspaceConfig},
    error::PanelError,
    provider::RunningItemProvider,
    workspace::Workspace,
};
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long to wait for a provider to announce the outcome of a
/// fire-and-forget request before printing.
const SETTLE_TIMEOUT: Duration = Duration::from_millis(500);

/// runpanel - the running-items panel
#[derive(ClapParser, Debug)]
#[command(name = "runpanel", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Workspace file (defaults to <config dir>/runpanel/workspace.toml)
    #[arg(long, global = true, env = "RUNPANEL_WORKSPACE")]
    workspace: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print every provider and its running items
    List,

    /// Shut down all items, then print what is left
    ShutdownAll {
        /// Only this provider group
        #[arg(long)]
        provider: Option<String>,
    },

    /// Ask every provider to resynchronize, then print the panel
    Refresh,

    /// Write a starter workspace file
    Init {
        /// Replace an existing workspace file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Error, Debug)]
pub enum RunpanelError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("panel error: {0}")]
    Panel(#[from] PanelError),

    #[error("no provider named {0}")]
    UnknownProvider(String),

    #[error("no workspace path given and no config directory available")]
    NoWorkspacePath,

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[tokio::main]
async fn main() -> Result<(), RunpanelError> {
    let cli = Cli::parse();
    init_tracing();

    if let Commands::Init { force } = cli.command {
        return init_workspace(cli.workspace, force);
    }

    let config = load_workspace(cli.workspace)?;
    let workspace = Workspace::from_config(&config)?;

    match cli.command {
        Commands::List | Commands::Init { .. } => {}
        Commands::ShutdownAll { provider } => {
            let targets = match provider {
                Some(name) => vec![workspace
                    .registry
                    .get(&name)
                    .ok_or(RunpanelError::UnknownProvider(name))?],
                None => workspace.registry.providers(),
            };
            let waits = settle(&targets);
            for provider in &targets {
                tracing::info!(provider = %provider.name(), "shutting down all items");
                provider.shutdown_all();
            }
            waits.await;
        }
        Commands::Refresh => {
            let waits = settle(&workspace.registry.providers());
            workspace.registry.refresh_all();
            waits.await;
        }
    }

    let snapshot = workspace.registry.snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

/// Subscribe to every provider's change signal now, and return a future
/// that resolves once each has fired or [`SETTLE_TIMEOUT`] elapses.
fn settle(providers: &[Arc<dyn RunningItemProvider>]) -> impl std::future::Future<Output = ()> {
    let receivers: Vec<_> = providers
        .iter()
        .map(|p| (p.name().to_string(), p.running_changed().subscribe()))
        .collect();
    async move {
        for (name, mut rx) in receivers {
            if tokio::time::timeout(SETTLE_TIMEOUT, rx.recv()).await.is_err() {
                tracing::debug!(provider = %name, "no change announced");
            }
        }
    }
}

fn init_workspace(path: Option<PathBuf>, force: bool) -> Result<(), RunpanelError> {
    let path = path
        .or_else(config::default_path)
        .ok_or(RunpanelError::NoWorkspacePath)?;
    WorkspaceConfig::starter().save(&path, force)?;
    tracing::info!(path = %path.display(), "wrote starter workspace");
    println!("{}", path.display());
    Ok(())
}

fn load_workspace(path: Option<PathBuf>) -> Result<WorkspaceConfig, RunpanelError> {
    let Some(path) = path.or_else(config::default_path) else {
        tracing::info!("no config directory; starting with an empty workspace");
        return Ok(WorkspaceConfig::default());
    };
    match WorkspaceConfig::load(&path)? {
        Some(config) => {
            tracing::info!(path = %path.display(), "loaded workspace");
            Ok(config)
        }
        None => {
            tracing::info!(path = %path.display(), "workspace file not found; starting empty");
            Ok(WorkspaceConfig::default())
        }
    }
}

/// Initialize tracing with stderr output; stdout carries the JSON panel.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "runpanel=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
