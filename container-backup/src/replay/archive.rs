//! Second pass over an archive: re-create every entry under its remapped path.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tar::{Entry, EntryType};
use tracing::warn;

use super::{ReplayOptions, ReplaySummary};
use crate::archive::host_path;
use crate::archive::reader::{is_manifest_entry, open_archive};
use crate::config::UnsupportedEntryPolicy;
use crate::fs::metadata::apply_to_path;
use crate::remap::RemapTable;
use crate::utils::{BackupError, Result};

enum Outcome {
    Restored,
    /// Directory created; its mode and owner are applied after the last entry
    Directory(PendingDir),
    Skipped,
}

struct PendingDir {
    target: PathBuf,
    mode: u32,
    owner: Option<(u32, u32)>,
}

/// Replay all file and directory entries of the archive at `path`.
///
/// Entries are handled in archive order. Missing ancestor directories are
/// created on demand. Directory modes and owners are applied once every
/// entry is written, deepest first, so read-only directories still receive
/// their contents. By default the first failing entry aborts the replay;
/// with `continue_on_error` failures are counted and reported at the end.
pub fn replay_archive(path: &Path, table: &RemapTable, options: &ReplayOptions) -> Result<ReplaySummary> {
    let mut archive = open_archive(path)?;
    let mut summary = ReplaySummary::default();
    let mut directories = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry.path()?.into_owned();
        if is_manifest_entry(&name) {
            continue;
        }

        match restore_entry(&mut entry, &host_path(&name), table, options) {
            Ok(Outcome::Restored) => summary.restored += 1,
            Ok(Outcome::Directory(pending)) => {
                summary.restored += 1;
                directories.push(pending);
            }
            Ok(Outcome::Skipped) => summary.skipped += 1,
            Err(e) if options.continue_on_error => {
                warn!("Failed to restore {}: {}", name.display(), e);
                summary.failed += 1;
            }
            Err(e) => return Err(e),
        }
    }

    for dir in directories.iter().rev() {
        match apply_to_path(&dir.target, dir.mode, dir.owner) {
            Ok(()) => {}
            Err(e) if options.continue_on_error => {
                warn!("Failed to set permissions on {}: {}", dir.target.display(), e);
                summary.failed += 1;
            }
            Err(e) => return Err(BackupError::fs(&dir.target, e)),
        }
    }

    if summary.failed > 0 {
        return Err(BackupError::Replay {
            failed: summary.failed,
        });
    }
    Ok(summary)
}

fn restore_entry<R: Read>(
    entry: &mut Entry<'_, R>,
    stored: &Path,
    table: &RemapTable,
    options: &ReplayOptions,
) -> Result<Outcome> {
    let header = entry.header();
    let entry_type = header.entry_type();
    let mode = header.mode()?;
    let owner = if options.preserve_ownership {
        Some((header.uid()? as u32, header.gid()? as u32))
    } else {
        None
    };

    let target = table.rewrite(stored);
    let fs_err = |e: io::Error| BackupError::fs(&target, e);

    match entry_type {
        EntryType::Directory => {
            println!("Restoring: {}", stored.display());
            fs::create_dir_all(&target).map_err(fs_err)?;
            println!("Created as: {}", target.display());
            return Ok(Outcome::Directory(PendingDir { target, mode, owner }));
        }
        EntryType::Regular | EntryType::Continuous => {
            println!("Restoring: {}", stored.display());
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(fs_err)?;
            }
            let mut file = File::create(&target).map_err(fs_err)?;
            io::copy(entry, &mut file).map_err(fs_err)?;
        }
        other => {
            return match options.unsupported_entries {
                UnsupportedEntryPolicy::Skip => {
                    warn!("Skipping {}: unsupported entry type {:?}", stored.display(), other);
                    Ok(Outcome::Skipped)
                }
                UnsupportedEntryPolicy::Error => Err(BackupError::UnsupportedEntry {
                    path: stored.display().to_string(),
                    kind: format!("{:?}", other),
                }),
            };
        }
    }

    apply_to_path(&target, mode, owner).map_err(fs_err)?;
    println!("Created as: {}", target.display());
    Ok(Outcome::Restored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::writer::{write_archive, ArchiveOptions};
    use crate::archive::archive_name;
    use crate::fs::walker::MountWalk;
    use crate::manifest::{Manifest, MountPoint};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn manifest_for(source: &Path) -> Manifest {
        Manifest {
            name: "/app".to_string(),
            config: json!({"Image": "app:1"}),
            port_map: json!({}),
            mounts: vec![MountPoint::new("volume", &source.to_string_lossy(), "/data")],
        }
    }

    /// Relative path -> (mode, contents; None for directories)
    fn snapshot_tree(root: &Path) -> Result<BTreeMap<PathBuf, (u32, Option<Vec<u8>>)>> {
        let mut tree = BTreeMap::new();
        for visited in MountWalk::new(root).iter() {
            let visited = visited?;
            let relative = visited.path.strip_prefix(root).unwrap_or(&visited.path).to_path_buf();
            let contents = match visited.metadata.kind {
                crate::fs::metadata::EntryKind::File => Some(fs::read(&visited.path)?),
                _ => None,
            };
            tree.insert(relative, (visited.metadata.mode, contents));
        }
        Ok(tree)
    }

    fn populate(root: &Path) -> io::Result<()> {
        fs::create_dir_all(root.join("conf/nested"))?;
        fs::create_dir(root.join("empty"))?;
        fs::write(root.join("index.html"), b"<h1>hi</h1>")?;
        fs::write(root.join("conf/app.toml"), b"port = 8080\n")?;
        fs::write(root.join("conf/nested/blob.bin"), (0..=255u8).cycle().take(70_000).collect::<Vec<_>>())?;
        fs::write(root.join("run.sh"), b"#!/bin/sh\n")?;
        fs::set_permissions(root.join("run.sh"), fs::Permissions::from_mode(0o750))?;
        fs::set_permissions(root.join("conf/app.toml"), fs::Permissions::from_mode(0o600))?;
        fs::set_permissions(root.join("empty"), fs::Permissions::from_mode(0o700))?;
        Ok(())
    }

    fn round_trip(compress: bool) -> Result<()> {
        let old = TempDir::new()?;
        let new = TempDir::new()?;
        let out = TempDir::new()?;
        populate(old.path())?;

        let manifest = manifest_for(old.path());
        let options = ArchiveOptions {
            compress,
            compression_level: 3,
            verbose: false,
        };
        let archive = write_archive(&out.path().join("app"), &manifest, &options)?;

        let new_mounts = vec![MountPoint::new("volume", &new.path().to_string_lossy(), "/data")];
        let (table, gaps) = RemapTable::build(&manifest.mounts, &new_mounts);
        assert!(gaps.is_empty());

        let summary = replay_archive(&archive, &table, &ReplayOptions::default())?;
        // 4 directories (root, conf, conf/nested, empty) + 4 files
        assert_eq!(summary.restored, 8);
        assert_eq!(summary.failed, 0);

        assert_eq!(snapshot_tree(new.path())?, snapshot_tree(old.path())?);
        Ok(())
    }

    #[test]
    fn test_archive_round_trip() -> Result<()> {
        round_trip(false)
    }

    #[test]
    fn test_compressed_archive_round_trip() -> Result<()> {
        round_trip(true)
    }

    /// Build an archive by hand so entry order and types can be controlled.
    fn handmade_archive(dir: &Path, entries: &[(&str, EntryType, &[u8])]) -> Result<PathBuf> {
        let path = dir.join("handmade.tar");
        let mut builder = tar::Builder::new(File::create(&path)?);

        let manifest = manifest_for(Path::new("/unused")).to_json_pretty()?;
        let mut header = tar::Header::new_gnu();
        header.set_size(manifest.len() as u64);
        header.set_mode(0o600);
        builder.append_data(&mut header, crate::manifest::ARCHIVE_MANIFEST_NAME, manifest.as_slice())?;

        for (name, kind, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(*kind);
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            if *kind == EntryType::Symlink {
                builder.append_link(&mut header, name, "target")?;
            } else {
                builder.append_data(&mut header, name, *data)?;
            }
        }
        builder.finish()?;
        Ok(path)
    }

    fn table_onto(old: &str, new: &Path) -> RemapTable {
        let (table, _) = RemapTable::build(
            &[MountPoint::new("volume", old, "/data")],
            &[MountPoint::new("volume", &new.to_string_lossy(), "/data")],
        );
        table
    }

    #[test]
    fn test_file_before_its_directory_creates_ancestors() -> Result<()> {
        let work = TempDir::new()?;
        let new = TempDir::new()?;
        let archive = handmade_archive(
            work.path(),
            &[("old/vol/a/b/c.txt", EntryType::Regular, &b"deep"[..])],
        )?;

        let table = table_onto("/old/vol", new.path());
        let options = ReplayOptions {
            preserve_ownership: false,
            ..ReplayOptions::default()
        };
        let summary = replay_archive(&archive, &table, &options)?;

        assert_eq!(summary.restored, 1);
        assert_eq!(fs::read(new.path().join("a/b/c.txt"))?, b"deep");
        Ok(())
    }

    #[test]
    fn test_unsupported_entry_policy() -> Result<()> {
        let work = TempDir::new()?;
        let new = TempDir::new()?;
        let archive = handmade_archive(
            work.path(),
            &[
                ("old/vol/link", EntryType::Symlink, &b""[..]),
                ("old/vol/file.txt", EntryType::Regular, &b"data"[..]),
            ],
        )?;
        let table = table_onto("/old/vol", new.path());

        let skip = ReplayOptions {
            preserve_ownership: false,
            ..ReplayOptions::default()
        };
        let summary = replay_archive(&archive, &table, &skip)?;
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.restored, 1);
        assert!(!new.path().join("link").exists());

        let strict = ReplayOptions {
            unsupported_entries: UnsupportedEntryPolicy::Error,
            ..skip
        };
        let result = replay_archive(&archive, &table, &strict);
        assert!(matches!(result, Err(BackupError::UnsupportedEntry { .. })));
        Ok(())
    }

    #[test]
    fn test_first_error_aborts_unless_continuing() -> Result<()> {
        let work = TempDir::new()?;
        let new = TempDir::new()?;
        // A regular file where the next entry needs a directory.
        let archive = handmade_archive(
            work.path(),
            &[
                ("old/vol/blocker", EntryType::Regular, &b"x"[..]),
                ("old/vol/blocker/inner.txt", EntryType::Regular, &b"y"[..]),
                ("old/vol/after.txt", EntryType::Regular, &b"z"[..]),
            ],
        )?;
        let table = table_onto("/old/vol", new.path());

        let abort = ReplayOptions {
            preserve_ownership: false,
            ..ReplayOptions::default()
        };
        let result = replay_archive(&archive, &table, &abort);
        assert!(matches!(result, Err(BackupError::Filesystem { .. })));
        assert!(!new.path().join("after.txt").exists());

        let keep_going = ReplayOptions {
            continue_on_error: true,
            ..abort
        };
        let result = replay_archive(&archive, &table, &keep_going);
        assert!(matches!(result, Err(BackupError::Replay { failed: 1 })));
        assert_eq!(fs::read(new.path().join("after.txt"))?, b"z");
        Ok(())
    }

    #[test]
    fn test_read_only_directory_receives_its_files() -> Result<()> {
        let work = TempDir::new()?;
        let new = TempDir::new()?;
        let path = work.path().join("readonly.tar");

        let mut builder = tar::Builder::new(File::create(&path)?);
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(EntryType::Directory);
        header.set_size(0);
        header.set_mode(0o555);
        builder.append_data(&mut header, "old/vol/ro", io::empty())?;
        let mut header = tar::Header::new_gnu();
        header.set_size(4);
        header.set_mode(0o444);
        builder.append_data(&mut header, "old/vol/ro/file.txt", &b"data"[..])?;
        builder.finish()?;
        drop(builder);

        let table = table_onto("/old/vol", new.path());
        let options = ReplayOptions {
            preserve_ownership: false,
            ..ReplayOptions::default()
        };
        let summary = replay_archive(&path, &table, &options)?;

        let dir = new.path().join("ro");
        assert_eq!(summary.restored, 2);
        assert_eq!(fs::read(dir.join("file.txt"))?, b"data");
        assert_eq!(fs::metadata(&dir)?.permissions().mode() & 0o7777, 0o555);

        // Let the temp dir clean up after itself.
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o755))?;
        Ok(())
    }

    #[test]
    fn test_unmatched_paths_pass_through() -> Result<()> {
        let work = TempDir::new()?;
        let elsewhere = TempDir::new()?;
        let new = TempDir::new()?;

        // An entry outside every old mount lands at its stored absolute path.
        let stray = elsewhere.path().join("stray.txt");
        let stray_name = archive_name(&stray).to_string_lossy().into_owned();
        let archive = handmade_archive(work.path(), &[(stray_name.as_str(), EntryType::Regular, &b"kept"[..])])?;

        let table = table_onto("/old/vol", new.path());
        let options = ReplayOptions {
            preserve_ownership: false,
            ..ReplayOptions::default()
        };
        replay_archive(&archive, &table, &options)?;

        assert_eq!(fs::read(&stray)?, b"kept");
        assert_eq!(fs::read_dir(new.path())?.count(), 0);
        Ok(())
    }
}
