//! Snapshot command handlers.
//!
//! Handles creating, listing, restoring and removing snapshots.

use clap::Subcommand;
use std::path::Path;
use stepback_snapshot::{Snapshot, SnapshotEngine};

/// Snapshot subcommands.
#[derive(Subcommand)]
pub enum SnapshotCommands {
    /// Snapshot all pending changes
    Create,
    /// List snapshots
    List,
    /// Show snapshot details
    Show {
        /// Snapshot version
        version: u32,
    },
    /// Restore the working tree to a snapshot
    Restore {
        /// Snapshot version
        version: u32,
        /// Discard uncommitted changes, including untracked files
        #[arg(short, long)]
        force: bool,
    },
    /// Keep only the newest snapshots
    Prune {
        /// How many snapshots to keep (defaults to maxSnapshots)
        #[arg(short, long)]
        keep: Option<usize>,
    },
    /// Delete a single snapshot
    Delete {
        /// Snapshot version
        version: u32,
    },
    /// Show repository status
    Status,
    /// Diff the working tree against a snapshot
    Diff {
        /// Snapshot version
        version: u32,
    },
}

fn format_time(snapshot: &Snapshot) -> String {
    snapshot
        .created_at()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_details(snapshot: &Snapshot) {
    println!("Snapshot: {}", snapshot.version);
    println!("Tag: {}", snapshot.tag);
    println!("Commit: {}", snapshot.commit_ref);
    println!("Created: {}", format_time(snapshot));
    println!("Message: {}", snapshot.message);
    if snapshot.files_changed.is_empty() {
        println!("Files: (none)");
    } else {
        println!("Files:");
        for file in &snapshot.files_changed {
            println!("  {file}");
        }
    }
}

/// Handle snapshot commands.
pub async fn handle_snapshot(
    command: SnapshotCommands,
    engine: &SnapshotEngine,
    project: &Path,
    json: bool,
) -> anyhow::Result<()> {
    match command {
        SnapshotCommands::Create => match engine.create_snapshot(project).await? {
            Some(snapshot) if json => print_json(&snapshot)?,
            Some(snapshot) => println!(
                "Created snapshot {} ({}, {} files)",
                snapshot.version,
                snapshot.short_ref(),
                snapshot.files_changed.len()
            ),
            None if json => println!("null"),
            None => println!("Nothing to snapshot."),
        },
        SnapshotCommands::List => {
            let snapshots = engine.list_snapshots(project).await?;
            if json {
                return print_json(&snapshots);
            }
            if snapshots.is_empty() {
                println!("No snapshots found.");
                return Ok(());
            }

            let current = engine.current_version(project).await?;
            println!("{:<3}{:<9} {:<10} {:<20} {:>6}", "", "VERSION", "COMMIT", "CREATED", "FILES");
            println!("{}", "-".repeat(50));
            for snapshot in &snapshots {
                let marker = if current == Some(snapshot.version) { "*" } else { "" };
                println!(
                    "{:<3}{:<9} {:<10} {:<20} {:>6}",
                    marker,
                    snapshot.version,
                    snapshot.short_ref(),
                    format_time(snapshot),
                    snapshot.files_changed.len()
                );
            }
        }
        SnapshotCommands::Show { version } => {
            let snapshot = engine.get_snapshot(project, version).await?;
            if json {
                return print_json(&snapshot);
            }
            print_details(&snapshot);
        }
        SnapshotCommands::Restore { version, force } => {
            let snapshot = engine.restore_snapshot(project, version, force).await?;
            if json {
                return print_json(&snapshot);
            }
            println!("Restored snapshot {} ({})", snapshot.version, snapshot.short_ref());
        }
        SnapshotCommands::Prune { keep } => {
            let keep = keep.unwrap_or(engine.config().max_snapshots);
            if keep == 0 {
                // maxSnapshots of 0 means unlimited retention.
                anyhow::bail!("No retention limit configured; pass --keep");
            }
            let removed = engine.prune_snapshots(project, keep).await?;
            if json {
                return print_json(&serde_json::json!({ "removed": removed }));
            }
            println!("Removed {removed} snapshot(s).");
        }
        SnapshotCommands::Delete { version } => {
            let snapshot = engine.delete_snapshot(project, version).await?;
            if json {
                return print_json(&snapshot);
            }
            println!("Deleted snapshot {}", snapshot.version);
        }
        SnapshotCommands::Status => {
            let status = engine.repository_status(project).await?;
            if json {
                return print_json(&status);
            }
            if !status.is_repository {
                println!("Not a repository: {}", project.display());
                return Ok(());
            }

            println!("Branch: {}", status.current_branch);
            if let Some(current) = engine.current_version(project).await? {
                println!("Current snapshot: {current}");
            }
            if status.is_rebasing {
                println!("Rebase in progress");
            }
            if status.is_merging {
                println!("Merge in progress");
            }
            if status.has_uncommitted_changes {
                println!(
                    "Pending: {} staged, {} modified, {} untracked",
                    status.staged_files.len(),
                    status.modified_files.len(),
                    status.untracked_files.len()
                );
            } else {
                println!("Working tree clean");
            }
        }
        SnapshotCommands::Diff { version } => {
            let diff = engine.diff_snapshot(project, version).await?;
            print!("{diff}");
        }
    }

    Ok(())
}
