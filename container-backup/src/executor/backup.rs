//! Snapshot pipeline: inspect a container, write its artifacts.

use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{error, info};

use crate::archive::writer::{write_archive, write_loose, ArchiveOptions, LooseArtifacts};
use crate::config::BackupConfig;
use crate::manifest::builder::build_manifest;
use crate::runtime::{short_id, ContainerRuntime};
use crate::utils::naming::artifact_base_name;
use crate::utils::{BackupError, Result};

#[derive(Debug, Clone)]
pub struct BackupOptions {
    pub output_dir: PathBuf,
    /// Archive mode instead of loose mode
    pub tar: bool,
    pub archive: ArchiveOptions,
    pub resolve_tags: bool,
    /// Command template run after each loose backup
    pub launch: Option<String>,
}

impl From<&BackupConfig> for BackupOptions {
    fn from(config: &BackupConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            tar: config.tar,
            archive: ArchiveOptions {
                compress: config.compress,
                compression_level: config.compression_level,
                verbose: config.verbose,
            },
            resolve_tags: config.resolve_tags,
            launch: config.launch.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum BackupArtifact {
    Loose(LooseArtifacts),
    Archive(PathBuf),
}

impl BackupArtifact {
    /// The file a later restore is pointed at.
    pub fn path(&self) -> &Path {
        match self {
            BackupArtifact::Loose(loose) => &loose.manifest_path,
            BackupArtifact::Archive(path) => path,
        }
    }
}

/// Snapshot one container into `options.output_dir`.
pub async fn backup_container<R>(runtime: &R, id: &str, options: &BackupOptions) -> Result<BackupArtifact>
where
    R: ContainerRuntime + ?Sized,
{
    let snapshot = build_manifest(runtime, id, options.resolve_tags).await?;
    let base_name = artifact_base_name(snapshot.manifest.image(), &snapshot.container_id);
    let base = options.output_dir.join(&base_name);
    let manifest = snapshot.manifest;

    if options.tar {
        let archive_options = options.archive.clone();
        let path = tokio::task::spawn_blocking(move || write_archive(&base, &manifest, &archive_options)).await??;
        return Ok(BackupArtifact::Archive(path));
    }

    let loose = tokio::task::spawn_blocking(move || write_loose(&base, &manifest)).await??;
    if let Some(template) = &options.launch {
        run_launch(template, &base_name, &loose.file_list_path).await?;
    }
    Ok(BackupArtifact::Loose(loose))
}

/// Snapshot every container the runtime lists.
///
/// Containers are processed one after another. Without `keep_going` the
/// first failure is returned and later containers are not attempted; with
/// it, failures are logged and a [`BackupError::Batch`] is returned once
/// all containers have been tried.
pub async fn backup_all<R>(
    runtime: &R,
    include_stopped: bool,
    keep_going: bool,
    options: &BackupOptions,
) -> Result<Vec<BackupArtifact>>
where
    R: ContainerRuntime + ?Sized,
{
    let ids = runtime.list_containers(include_stopped).await?;
    let total = ids.len();
    info!("Backing up {} containers", total);

    let mut artifacts = Vec::with_capacity(total);
    let mut failed = 0usize;

    for id in &ids {
        match backup_container(runtime, id, options).await {
            Ok(artifact) => artifacts.push(artifact),
            Err(e) if keep_going => {
                error!("Backup of {} failed: {}", short_id(id), e);
                failed += 1;
            }
            Err(e) => return Err(e),
        }
    }

    if failed > 0 {
        return Err(BackupError::Batch { failed, total });
    }
    Ok(artifacts)
}

/// Split a launch template into argv, substituting `%tag` and `%list`.
///
/// Substitution happens per word, so paths containing spaces stay one
/// argument.
pub fn launch_command(template: &str, tag: &str, list: &Path) -> Vec<String> {
    let list = list.to_string_lossy();
    template
        .split_whitespace()
        .map(|word| word.replace("%tag", tag).replace("%list", &list))
        .collect()
}

async fn run_launch(template: &str, tag: &str, list: &Path) -> Result<()> {
    let argv = launch_command(template, tag, list);
    let Some((program, args)) = argv.split_first() else {
        return Err(BackupError::Launch("empty launch command".to_string()));
    };

    info!("Launching {}", argv.join(" "));
    let status = Command::new(program)
        .args(args)
        .status()
        .await
        .map_err(|e| BackupError::Launch(format!("{}: {}", program, e)))?;

    if !status.success() {
        return Err(BackupError::Launch(format!("{} exited with {}", program, status)));
    }
    Ok(())
}
