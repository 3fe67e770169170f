//! Directory traversal with metadata preservation.
//!
//! A [`MountWalk`] yields every path below a mount source, the root
//! included, as a lazy sequence. Calling [`MountWalk::iter`] again restarts
//! the walk from the top.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::metadata::FileMetadata;
use crate::utils::Result;

/// A path discovered during walking
#[derive(Debug, Clone)]
pub struct VisitedPath {
    /// Full path to the object
    pub path: PathBuf,

    pub metadata: FileMetadata,
}

/// Walk over one mount's source tree
#[derive(Debug, Clone)]
pub struct MountWalk {
    root: PathBuf,
}

impl MountWalk {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Visit the tree in file-name order, parents before children.
    /// Symlinks are reported, not followed.
    pub fn iter(&self) -> impl Iterator<Item = Result<VisitedPath>> {
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .map(|entry| -> Result<VisitedPath> {
                let entry = entry?;
                let metadata = entry.metadata()?;
                Ok(VisitedPath {
                    path: entry.into_path(),
                    metadata: FileMetadata::from_metadata(&metadata),
                })
            })
    }
}

/// Collect the visited paths of several mount sources, in mount order.
pub fn collect_paths<'a, I>(roots: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator<Item = &'a Path>,
{
    let mut paths = Vec::new();
    for root in roots {
        for visited in MountWalk::new(root).iter() {
            paths.push(visited?.path);
        }
    }
    Ok(paths)
}
