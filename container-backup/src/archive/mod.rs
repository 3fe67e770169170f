//! Backup artifacts on disk.
//!
//! Loose mode writes `<name>.backup.json` plus `<name>.backup.files`.
//! Archive mode writes `<name>.tar` (or `<name>.tar.zst`) whose first entry
//! is the manifest, followed by one entry per archived path.

pub mod filelist;
pub mod reader;
pub mod writer;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::utils::{BackupError, Result};

pub const LOOSE_MANIFEST_SUFFIX: &str = ".backup.json";
pub const FILE_LIST_SUFFIX: &str = ".backup.files";
pub const TAR_SUFFIX: &str = ".tar";
pub const TAR_ZSTD_SUFFIX: &str = ".tar.zst";

/// Kind of backup artifact, decided by file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// `.json` manifest with files copied alongside
    Loose,
    Tar,
    TarZstd,
}

impl ArtifactKind {
    pub fn detect(path: &Path) -> Result<Self> {
        let name = path.to_string_lossy();
        if name.ends_with(TAR_ZSTD_SUFFIX) {
            Ok(ArtifactKind::TarZstd)
        } else if name.ends_with(TAR_SUFFIX) {
            Ok(ArtifactKind::Tar)
        } else if name.ends_with(".json") {
            Ok(ArtifactKind::Loose)
        } else {
            Err(BackupError::UnknownArtifact(path.to_path_buf()))
        }
    }

    pub fn is_archive(self) -> bool {
        !matches!(self, ArtifactKind::Loose)
    }
}

/// `base` with `suffix` appended to its final component.
pub fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = base.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Path stored in an archive for an absolute host path: relative to `/`.
pub fn archive_name(path: &Path) -> &Path {
    path.strip_prefix("/").unwrap_or(path)
}

/// Absolute host path of an archive entry name.
pub fn host_path(name: &Path) -> PathBuf {
    Path::new("/").join(name)
}

/// Directory holding the copied files of a loose backup: the manifest path
/// without its `.json` extension.
pub fn loose_data_dir(manifest_path: &Path) -> PathBuf {
    let name = manifest_path.to_string_lossy();
    PathBuf::from(name.strip_suffix(".json").unwrap_or(&name))
}

/// Where a mount's files live inside a loose backup's data directory.
pub fn loose_mount_dir(data_dir: &Path, source: &str) -> PathBuf {
    data_dir.join(source.trim_start_matches('/'))
}
