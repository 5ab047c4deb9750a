use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use redline::config::{Config, SharedConfig};
use redline::context::{SessionContext, SettingsSource};
use redline::fs::LocalFileSystem;
use redline::integrations::detect_workspace;
use redline::integrations::editor::DiffViewProvider;
use redline::integrations::headless::HeadlessHost;

const DEFAULT_CONFIG_FILE: &str = ".redline.json";

#[derive(Parser)]
#[command(name = "redline")]
#[command(about = "Stream a proposed file edit through a diff view, then save or revert it")]
#[command(version)]
struct Cli {
    /// File to edit, relative to the workspace root
    path: String,

    /// Workspace root (defaults to the current directory)
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Configuration file (defaults to .redline.json in the workspace)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Read the proposed content from this file instead of stdin
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Lines streamed per update
    #[arg(long, default_value_t = 5)]
    chunk_lines: usize,

    /// Write straight to disk without a diff view
    #[arg(long, conflicts_with = "revert")]
    direct: bool,

    /// Stream the content, then throw it away
    #[arg(long)]
    revert: bool,

    /// Back up the existing file before a direct save
    #[arg(long, requires = "direct")]
    backup: bool,

    /// Print the write result as JSON instead of markup
    #[arg(long)]
    json: bool,
}

async fn read_proposed(input: Option<&PathBuf>) -> Result<String> {
    match input {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut content = String::new();
            tokio::io::stdin()
                .read_to_string(&mut content)
                .await
                .context("Failed to read proposed content from stdin")?;
            Ok(content)
        }
    }
}

/// Feed `content` to the provider `chunk_lines` lines at a time, then once more as final.
async fn stream(provider: &mut DiffViewProvider, content: &str, chunk_lines: usize) -> Result<()> {
    let chunk_lines = chunk_lines.max(1);
    let mut accumulated = String::with_capacity(content.len());
    for (idx, line) in content.split_inclusive('\n').enumerate() {
        accumulated.push_str(line);
        if (idx + 1) % chunk_lines == 0 {
            provider.update(&accumulated, false).await?;
        }
    }
    provider.update(content, true).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let workspace = detect_workspace(cli.cwd.as_deref()).context("Failed to detect workspace")?;
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| workspace.root_path.join(DEFAULT_CONFIG_FILE));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.as_filter())),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let shared = SharedConfig::new(config);
    if cli.backup {
        shared.update(|config| config.diff_view.create_backups = true);
    }
    let settings: Arc<dyn SettingsSource> = Arc::new(shared);

    let content = read_proposed(cli.input.as_ref()).await?;

    let host = Arc::new(HeadlessHost::new());
    let mut provider = DiffViewProvider::new(
        host,
        Arc::new(LocalFileSystem::new()),
        workspace.root_path.clone(),
        SessionContext::new(&settings),
    );
    info!("Workspace {} at {}", workspace.name, workspace.root_path.display());

    if cli.direct {
        let outcome = provider
            .save_directly(&cli.path, &content, false)
            .await
            .with_context(|| format!("Failed to save {}", cli.path))?;
        if let Some(backup) = &outcome.backup_path {
            info!("Backup written to {}", backup.display());
        }
    } else {
        provider
            .open(&cli.path)
            .await
            .with_context(|| format!("Failed to open a diff view for {}", cli.path))?;

        if let Err(e) = stream(&mut provider, &content, cli.chunk_lines).await {
            if let Err(revert_error) = provider.revert_changes().await {
                warn!("Cleanup after failed edit also failed: {}", revert_error);
            }
            provider.reset();
            return Err(e).with_context(|| format!("Edit of {} failed", cli.path));
        }

        if cli.revert {
            provider.revert_changes().await?;
            provider.dispose();
            println!("Reverted {}", cli.path);
            return Ok(());
        }
        provider
            .save_changes()
            .await
            .with_context(|| format!("Failed to save {}", cli.path))?;
    }

    let written = provider.push_tool_write_result()?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&written)?);
    } else {
        println!("{}", written.to_markup());
    }

    provider.dispose();
    Ok(())
}
