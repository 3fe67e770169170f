//! File metadata handling for backup operations.
//!
//! This module captures the metadata an archive entry carries (type,
//! permissions, ownership, mtime) and applies it again on restore.

use nix::unistd::{chown, Gid, Uid};
use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;

/// What kind of filesystem object a path is. Symlinks are never followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
    Symlink,
    /// Sockets, fifos and device nodes
    Other,
}

/// Metadata preserved for every archived path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub kind: EntryKind,

    /// Permission bits including setuid/setgid/sticky
    pub mode: u32,

    pub uid: u32,
    pub gid: u32,

    /// Size in bytes (zero for anything but regular files)
    pub size: u64,

    /// Last modified time (seconds since Unix epoch)
    pub mtime: i64,
}

impl FileMetadata {
    /// Build from `symlink_metadata`-style metadata
    pub fn from_metadata(metadata: &fs::Metadata) -> Self {
        let file_type = metadata.file_type();
        let kind = if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_file() {
            EntryKind::File
        } else if file_type.is_symlink() {
            EntryKind::Symlink
        } else {
            EntryKind::Other
        };

        Self {
            kind,
            mode: metadata.mode() & 0o7777,
            uid: metadata.uid(),
            gid: metadata.gid(),
            size: if kind == EntryKind::File { metadata.len() } else { 0 },
            mtime: metadata.mtime(),
        }
    }

    /// Extract metadata from a path without following symlinks
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        Ok(Self::from_metadata(&fs::symlink_metadata(path)?))
    }
}

/// Apply permission bits and, optionally, ownership to a restored path.
pub fn apply_to_path(
    path: &Path,
    mode: u32,
    owner: Option<(u32, u32)>,
) -> std::io::Result<()> {
    // chown may clear setuid/setgid, so the mode goes last
    if let Some((uid, gid)) = owner {
        chown(path, Some(Uid::from_raw(uid)), Some(Gid::from_raw(gid)))
            .map_err(std::io::Error::from)?;
    }

    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
}
