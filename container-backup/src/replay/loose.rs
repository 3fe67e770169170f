//! Loose-file replay: sync each mount's backup directory onto its new source.

use std::path::Path;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::archive::{loose_data_dir, loose_mount_dir};
use crate::manifest::Manifest;
use crate::remap::RemapTable;
use crate::sync::{DirSync, SyncState};
use crate::transfer::progress::run_with_progress;
use crate::utils::Result;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LooseSummary {
    pub synced: usize,
    pub skipped: usize,
}

fn is_excluded(source: &str, exclude: &[String]) -> bool {
    exclude
        .iter()
        .any(|prefix| !prefix.is_empty() && source.starts_with(prefix.as_str()))
}

/// Replay a loose backup whose manifest lives at `manifest_path`.
///
/// Mounts are processed one at a time in manifest order. The first failing
/// transfer aborts the replay.
pub async fn replay_loose<S>(
    manifest_path: &Path,
    manifest: &Manifest,
    table: &RemapTable,
    sync: &S,
    exclude: &[String],
    interval: Duration,
) -> Result<LooseSummary>
where
    S: DirSync + ?Sized,
{
    let data_dir = loose_data_dir(manifest_path);
    let mut summary = LooseSummary::default();
    let mut seen: Vec<&str> = Vec::new();

    for mount in &manifest.mounts {
        if seen.contains(&mount.source.as_str()) {
            continue;
        }
        seen.push(&mount.source);

        let Some(target) = table.target_for(Path::new(&mount.source)) else {
            warn!("No new mount for {}, not restored", mount.source);
            summary.skipped += 1;
            continue;
        };

        if is_excluded(&mount.source, exclude) {
            println!("Skipping '{}'", mount.source);
            summary.skipped += 1;
            continue;
        }

        let source = loose_mount_dir(&data_dir, &mount.source);
        println!("Restoring '{}' -> '{}'", source.display(), target.display());
        debug!("Mount {} synced from {}", mount.destination, source.display());

        let (tx, rx) = watch::channel(SyncState::default());
        run_with_progress(sync.sync(&source, target, &tx), rx, interval).await?;
        summary.synced += 1;
    }

    Ok(summary)
}
