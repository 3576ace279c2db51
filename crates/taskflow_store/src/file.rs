//! Snapshot persistence as pretty-printed JSON.

use std::path::Path;

use taskflow_core::Snapshot;
use tracing::debug;

use crate::error::Result;

pub async fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let raw = tokio::fs::read_to_string(path).await?;
    let snapshot: Snapshot = serde_json::from_str(&raw)?;
    debug!(
        path = %path.display(),
        tasks = snapshot.tasks.len(),
        "snapshot loaded"
    );
    Ok(snapshot)
}

/// Writes through a sibling temp file and renames it over `path`.
pub async fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(snapshot)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
