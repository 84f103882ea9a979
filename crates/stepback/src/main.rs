//! Stepback - automatic checkpoints for AI-assisted coding.
//!
//! This is the main entry point for the stepback CLI.

mod commands;

use clap::{Parser, Subcommand};
use commands::*;
use std::path::PathBuf;
use stepback_snapshot::{SnapshotConfig, SnapshotEngine};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "stepback")]
#[command(author, version, about = "Automatic git-backed checkpoints for your project", long_about = None)]
struct Cli {
    /// Project directory (defaults to the current directory)
    #[arg(short = 'C', long, global = true)]
    project: Option<PathBuf>,

    /// Print output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Snapshot(SnapshotCommands),
    /// Show configuration
    Config,
    /// Print version information
    Version,
}

fn print_version() {
    println!("stepback {}", env!("CARGO_PKG_VERSION"));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_file = init_logging(cli.verbose);
    if let Some(path) = &log_file {
        debug!(path = %path.display(), "Logging to file");
    }

    let project = match cli.project {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let project = stepback_util::path::project_key(&project);

    match cli.command {
        Commands::Version => {
            print_version();
            Ok(())
        }
        Commands::Config => show_config(&project, cli.json).await,
        Commands::Snapshot(command) => {
            let (config, sources) = SnapshotConfig::load(Some(&project)).await?;
            info!(
                project = %project.display(),
                sources = ?sources,
                "Loaded configuration"
            );
            let engine = SnapshotEngine::new(config);
            handle_snapshot(command, &engine, &project, cli.json).await
        }
    }
}
