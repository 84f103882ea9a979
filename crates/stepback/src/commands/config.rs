//! Configuration display.

use std::path::Path;
use stepback_snapshot::SnapshotConfig;

/// Print the resolved configuration and where it came from.
pub async fn show_config(project: &Path, json: bool) -> anyhow::Result<()> {
    let (config, sources) = SnapshotConfig::load(Some(project)).await?;

    if json {
        let value = serde_json::json!({
            "config": config,
            "sources": sources,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if sources.is_empty() {
        println!("Sources: (defaults only)");
    } else {
        println!("Sources:");
        for source in &sources {
            println!("  {}", source.display());
        }
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
