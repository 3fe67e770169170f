//! Restore pipeline.
//!
//! A restore moves through fixed stages:
//! `ManifestLoaded -> ContainerCreated -> RemapComputed -> FilesReplayed`,
//! then `ContainerStarted` when requested. A failing stage ends the restore;
//! a container that was already created is left in place.

use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::archive::reader::load_manifest;
use crate::archive::ArtifactKind;
use crate::config::Config;
use crate::manifest::{Manifest, MountPoint};
use crate::remap::RemapTable;
use crate::replay::{replay_archive, replay_loose, LooseSummary, ReplayOptions, ReplaySummary};
use crate::runtime::{short_id, ContainerRuntime};
use crate::sync::DirSync;
use crate::utils::naming::container_short_name;
use crate::utils::Result;

#[derive(Debug, Clone)]
pub struct RestoreOptions {
    /// Start the container after its files are replayed
    pub start: bool,
    /// Mount source prefixes skipped by loose replay
    pub exclude: Vec<String>,
    pub replay: ReplayOptions,
    pub progress_interval: Duration,
}

impl RestoreOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            start: config.restore.start,
            exclude: config.restore.exclude.clone(),
            replay: ReplayOptions::from(&config.restore),
            progress_interval: Duration::from_millis(config.sync.progress_interval_ms.max(1)),
        }
    }
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RestoreStage {
    ManifestLoaded,
    ContainerCreated,
    RemapComputed,
    FilesReplayed,
    ContainerStarted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    Archive(ReplaySummary),
    Loose(LooseSummary),
}

#[derive(Debug, Clone)]
pub struct RestoreReport {
    pub container_id: String,
    /// Last stage reached
    pub stage: RestoreStage,
    pub table: RemapTable,
    /// Old mounts without a counterpart in the new container
    pub gaps: Vec<MountPoint>,
    pub replay: ReplayOutcome,
}

/// A freshly created container and the mounts the runtime gave it.
#[derive(Debug, Clone)]
pub struct Materialized {
    pub id: String,
    pub mounts: Vec<MountPoint>,
}

/// Create a container from `manifest`, pulling its image first if needed.
pub async fn materialize<R>(runtime: &R, manifest: &Manifest) -> Result<Materialized>
where
    R: ContainerRuntime + ?Sized,
{
    let image = manifest.image();
    if !image.is_empty() && !runtime.image_exists(image).await? {
        info!("Pulling image {}", image);
        runtime.pull_image(image).await?;
    }

    let name = Some(container_short_name(&manifest.name)).filter(|n| !n.is_empty());
    let id = runtime
        .create_container(name, &manifest.config, &manifest.port_map)
        .await?;
    info!("Created container {} ({})", name.unwrap_or("<unnamed>"), short_id(&id));

    for mount in &manifest.mounts {
        info!("Old mount: {} -> {}", mount.source, mount.destination);
    }

    let details = runtime.inspect_container(&id).await?;
    for mount in &details.mounts {
        info!("New mount: {} -> {}", mount.source, mount.destination);
    }

    Ok(Materialized {
        id,
        mounts: details.mounts,
    })
}

/// Restore the backup at `artifact` into a new container.
pub async fn restore<R, S>(runtime: &R, sync: &S, artifact: &Path, options: &RestoreOptions) -> Result<RestoreReport>
where
    R: ContainerRuntime + ?Sized,
    S: DirSync + ?Sized,
{
    let kind = ArtifactKind::detect(artifact)?;

    let path = artifact.to_path_buf();
    let manifest = tokio::task::spawn_blocking(move || load_manifest(&path)).await??;
    debug!("{:?}: {} ({})", RestoreStage::ManifestLoaded, artifact.display(), manifest.image());

    let materialized = materialize(runtime, &manifest).await?;
    debug!("{:?}: {}", RestoreStage::ContainerCreated, short_id(&materialized.id));

    let (table, gaps) = RemapTable::build(&manifest.mounts, &materialized.mounts);
    for (old, new) in table.iter() {
        debug!("Remap {} -> {}", old.display(), new.display());
    }
    debug!("{:?}: {} entries, {} gaps", RestoreStage::RemapComputed, table.len(), gaps.len());

    let replay = if kind.is_archive() {
        let path = artifact.to_path_buf();
        let replay_table = table.clone();
        let replay_options = options.replay;
        let summary =
            tokio::task::spawn_blocking(move || replay_archive(&path, &replay_table, &replay_options)).await??;
        ReplayOutcome::Archive(summary)
    } else {
        let summary = replay_loose(
            artifact,
            &manifest,
            &table,
            sync,
            &options.exclude,
            options.progress_interval,
        )
        .await?;
        ReplayOutcome::Loose(summary)
    };
    let mut stage = RestoreStage::FilesReplayed;
    debug!("{:?}: {:?}", stage, replay);

    if options.start {
        println!("Starting container: {}", short_id(&materialized.id));
        runtime.start_container(&materialized.id).await?;
        stage = RestoreStage::ContainerStarted;
    }

    Ok(RestoreReport {
        container_id: materialized.id,
        stage,
        table,
        gaps,
        replay,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ContainerDetails, ImageSummary};
    use crate::sync::SyncState;
    use crate::utils::BackupError;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use tokio::sync::watch;

    /// Records calls; the created container gets `new_mounts`.
    #[derive(Default)]
    struct Recorder {
        has_image: bool,
        fail_create: bool,
        new_mounts: Vec<MountPoint>,
        calls: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ContainerRuntime for Recorder {
        async fn inspect_container(&self, id: &str) -> Result<ContainerDetails> {
            self.calls.lock().unwrap().push(format!("inspect {}", id));
            Ok(ContainerDetails {
                id: id.to_string(),
                name: "/web".to_string(),
                config: json!({}),
                port_bindings: json!({}),
                mounts: self.new_mounts.clone(),
            })
        }

        async fn list_containers(&self, _include_stopped: bool) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn list_images(&self) -> Result<Vec<ImageSummary>> {
            Ok(Vec::new())
        }

        async fn image_exists(&self, reference: &str) -> Result<bool> {
            self.calls.lock().unwrap().push(format!("exists {}", reference));
            Ok(self.has_image)
        }

        async fn pull_image(&self, reference: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("pull {}", reference));
            Ok(())
        }

        async fn create_container(&self, name: Option<&str>, _: &Value, _: &Value) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("create {}", name.unwrap_or("-")));
            if self.fail_create {
                return Err(BackupError::Runtime("conflict".to_string()));
            }
            Ok("9f8e7d6c5b4a3210".to_string())
        }

        async fn start_container(&self, id: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("start {}", id));
            Ok(())
        }
    }

    struct NoSync;

    #[async_trait]
    impl DirSync for NoSync {
        async fn sync(&self, _: &Path, _: &Path, _: &watch::Sender<SyncState>) -> Result<()> {
            Ok(())
        }
    }

    fn manifest(image: &str) -> Manifest {
        Manifest {
            name: "/web".to_string(),
            config: json!({"Image": image}),
            port_map: json!({}),
            mounts: vec![MountPoint::new("volume", "/old/html", "/usr/share/nginx/html")],
        }
    }

    #[tokio::test]
    async fn test_materialize_pulls_missing_image() -> Result<()> {
        let runtime = Recorder {
            new_mounts: vec![MountPoint::new("volume", "/new/html", "/usr/share/nginx/html")],
            ..Default::default()
        };
        let materialized = materialize(&runtime, &manifest("nginx:1.25")).await?;

        assert_eq!(materialized.id, "9f8e7d6c5b4a3210");
        assert_eq!(materialized.mounts[0].source, "/new/html");
        assert_eq!(
            runtime.calls(),
            vec!["exists nginx:1.25", "pull nginx:1.25", "create web", "inspect 9f8e7d6c5b4a3210"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_materialize_skips_pull_for_local_image() -> Result<()> {
        let runtime = Recorder {
            has_image: true,
            ..Default::default()
        };
        let mut unnamed = manifest("nginx:1.25");
        unnamed.name = String::new();
        materialize(&runtime, &unnamed).await?;

        assert_eq!(runtime.calls(), vec!["exists nginx:1.25", "create -", "inspect 9f8e7d6c5b4a3210"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_create_stops_restore() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let artifact = dir.path().join("web.backup.json");
        std::fs::write(&artifact, manifest("nginx:1.25").to_json_pretty()?)?;

        let runtime = Recorder {
            has_image: true,
            fail_create: true,
            ..Default::default()
        };
        let options = RestoreOptions {
            start: true,
            ..Default::default()
        };
        let result = restore(&runtime, &NoSync, &artifact, &options).await;

        assert!(matches!(result, Err(BackupError::Runtime(_))));
        assert!(runtime.calls().iter().all(|c| !c.starts_with("start")));
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_artifact_is_rejected_before_runtime_calls() {
        let runtime = Recorder::default();
        let result = restore(&runtime, &NoSync, Path::new("/backups/web.zip"), &RestoreOptions::default()).await;

        assert!(matches!(result, Err(BackupError::UnknownArtifact(_))));
        assert!(runtime.calls().is_empty());
    }

    #[tokio::test]
    async fn test_loose_restore_reaches_started() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let artifact = dir.path().join("web.backup.json");
        std::fs::write(&artifact, manifest("nginx:1.25").to_json_pretty()?)?;

        let runtime = Recorder {
            has_image: true,
            new_mounts: vec![MountPoint::new("volume", "/new/html", "/usr/share/nginx/html")],
            ..Default::default()
        };
        let options = RestoreOptions {
            start: true,
            ..Default::default()
        };
        let report = restore(&runtime, &NoSync, &artifact, &options).await?;

        assert_eq!(report.stage, RestoreStage::ContainerStarted);
        assert_eq!(report.replay, ReplayOutcome::Loose(LooseSummary { synced: 1, skipped: 0 }));
        assert!(report.gaps.is_empty());
        assert_eq!(runtime.calls().last().map(String::as_str), Some("start 9f8e7d6c5b4a3210"));
        Ok(())
    }
}
