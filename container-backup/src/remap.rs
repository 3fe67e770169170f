//! Maps old mount sources onto the new container's mount sources.
//!
//! Mount sources are assigned by the runtime and change between hosts and
//! container re-creations; the in-container destination does not. Old and
//! new mounts are therefore joined on destination, and archived paths are
//! rewritten by swapping the old source prefix for the new one.

use std::path::{Path, PathBuf};
use tracing::warn;

use crate::manifest::MountPoint;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapTable {
    /// (old source, new source) in old-mount order
    entries: Vec<(PathBuf, PathBuf)>,
}

impl RemapTable {
    /// Join `old` and `new` mounts on destination.
    ///
    /// Returns the table together with the old mounts that found no
    /// counterpart; their files are replayed at their original location.
    pub fn build(old: &[MountPoint], new: &[MountPoint]) -> (Self, Vec<MountPoint>) {
        let mut entries: Vec<(PathBuf, PathBuf)> = Vec::new();
        let mut gaps = Vec::new();

        for old_mount in old {
            match new.iter().find(|m| m.destination == old_mount.destination) {
                Some(new_mount) => {
                    let old_source = PathBuf::from(&old_mount.source);
                    if entries.iter().any(|(o, _)| *o == old_source) {
                        continue;
                    }
                    entries.push((old_source, PathBuf::from(&new_mount.source)));
                }
                None => {
                    warn!(
                        "No mount for {} in the new container; files under {} are restored in place",
                        old_mount.destination, old_mount.source
                    );
                    gaps.push(old_mount.clone());
                }
            }
        }

        (Self { entries }, gaps)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// (old source, new source) pairs in old-mount order
    pub fn iter(&self) -> impl Iterator<Item = (&Path, &Path)> {
        self.entries.iter().map(|(o, n)| (o.as_path(), n.as_path()))
    }

    /// New source for an old mount source, if the mount was matched.
    pub fn target_for(&self, old_source: &Path) -> Option<&Path> {
        self.entries
            .iter()
            .find(|(o, _)| o == old_source)
            .map(|(_, n)| n.as_path())
    }

    /// Rewrite an archived absolute path into its restore location.
    ///
    /// The longest old source that is a whole-component prefix of `path`
    /// wins. Paths under no old source are returned unchanged.
    pub fn rewrite(&self, path: &Path) -> PathBuf {
        let best = self
            .entries
            .iter()
            .filter_map(|(old, new)| path.strip_prefix(old).ok().map(|rest| (old, new, rest)))
            .max_by_key(|(old, _, _)| old.components().count());

        match best {
            Some((_, new, rest)) if rest.as_os_str().is_empty() => new.clone(),
            Some((_, new, rest)) => new.join(rest),
            None => path.to_path_buf(),
        }
    }
}
