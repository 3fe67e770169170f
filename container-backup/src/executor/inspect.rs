//! Describe a backup artifact without restoring it.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::archive::filelist::FileList;
use crate::archive::reader::load_manifest;
use crate::archive::{ArtifactKind, FILE_LIST_SUFFIX, LOOSE_MANIFEST_SUFFIX};
use crate::manifest::Manifest;
use crate::utils::Result;

#[derive(Debug, Clone)]
pub struct ArtifactInfo {
    pub path: PathBuf,
    pub kind: ArtifactKind,
    pub manifest: Manifest,
    /// Paths named by the companion `.backup.files`, for loose backups that have one
    pub listed_paths: Option<usize>,
}

/// Load the manifest of `path` and, for loose backups, count its file list.
pub fn inspect_artifact(path: &Path) -> Result<ArtifactInfo> {
    let kind = ArtifactKind::detect(path)?;
    let manifest = load_manifest(path)?;

    let listed_paths = match kind {
        ArtifactKind::Loose => {
            let name = path.to_string_lossy();
            match name.strip_suffix(LOOSE_MANIFEST_SUFFIX) {
                Some(base) => {
                    let list_path = PathBuf::from(format!("{}{}", base, FILE_LIST_SUFFIX));
                    if list_path.exists() {
                        Some(FileList::read(&list_path)?.paths.len())
                    } else {
                        None
                    }
                }
                None => None,
            }
        }
        ArtifactKind::Tar | ArtifactKind::TarZstd => None,
    };

    Ok(ArtifactInfo {
        path: path.to_path_buf(),
        kind,
        manifest,
        listed_paths,
    })
}

impl fmt::Display for ArtifactInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Artifact: {} ({:?})", self.path.display(), self.kind)?;
        writeln!(f, "Name:     {}", self.manifest.name)?;
        writeln!(f, "Image:    {}", self.manifest.image())?;
        writeln!(f, "Ports:    {}", self.manifest.port_map)?;
        writeln!(f, "Mounts:   {}", self.manifest.mounts.len())?;
        for mount in &self.manifest.mounts {
            writeln!(f, "  {} {} -> {}", mount.kind, mount.source, mount.destination)?;
        }
        if let Some(count) = self.listed_paths {
            writeln!(f, "Files:    {}", count)?;
        }
        Ok(())
    }
}
