mod cmd_checkpoints;
mod cmd_config;
mod cmd_tui;
#[cfg(feature = "tui")]
mod tui;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use rewind_core::config::CONFIG_DIR;
use tracing_subscriber::EnvFilter;

use cmd_config::ConfigCmd;

const LOG_FILE: &str = "rewind.log";

#[derive(Parser)]
#[command(name = "rewind", version, about = "Checkpoint and restore for agent sessions")]
struct Cli {
    /// Debug-level logging (RUST_LOG overrides)
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive session: Esc Esc opens the checkpoint picker
    Tui {
        /// Seed the session from a JSONL transcript
        #[arg(long)]
        log: Option<PathBuf>,
        /// Write the reconciled transcript here on exit
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// List the checkpoints in a JSONL transcript, most recent first
    Checkpoints {
        /// Transcript file
        #[arg(long)]
        log: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage .rewind/config.json
    Config {
        #[command(subcommand)]
        cmd: ConfigCmd,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let repo_root = std::env::current_dir()?;

    match cli.cmd {
        Command::Tui { log, export } => {
            init_file_tracing(&repo_root, cli.verbose)?;
            cmd_tui::execute(&repo_root, log.as_deref(), export.as_deref())
        }
        Command::Checkpoints { log, json } => {
            init_stderr_tracing(cli.verbose);
            cmd_checkpoints::execute(&repo_root, &log, json)
        }
        Command::Config { cmd } => {
            init_stderr_tracing(cli.verbose);
            cmd_config::run(cmd, &repo_root)
        }
    }
}

fn env_filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "rewind=debug" } else { "rewind=info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

fn init_stderr_tracing(verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// The TUI owns the terminal, so logs go to `.rewind/rewind.log`.
fn init_file_tracing(repo_root: &Path, verbose: bool) -> anyhow::Result<()> {
    let dir = repo_root.join(CONFIG_DIR);
    std::fs::create_dir_all(&dir)?;
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE))?;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .try_init();
    Ok(())
}
