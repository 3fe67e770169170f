//! Writes backup artifacts for a manifest.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use tar::{Builder, EntryType, Header};
use tracing::{debug, warn};

use super::filelist::FileList;
use super::{archive_name, with_suffix, FILE_LIST_SUFFIX, LOOSE_MANIFEST_SUFFIX, TAR_SUFFIX, TAR_ZSTD_SUFFIX};
use crate::fs::metadata::EntryKind;
use crate::fs::walker::{collect_paths, MountWalk, VisitedPath};
use crate::manifest::{Manifest, ARCHIVE_MANIFEST_NAME};
use crate::utils::{BackupError, Result};

/// Archive-mode settings
#[derive(Debug, Clone, Default)]
pub struct ArchiveOptions {
    pub compress: bool,
    pub compression_level: i32,
    /// Print one line per archived path
    pub verbose: bool,
}

/// Files produced by a loose backup
#[derive(Debug, Clone)]
pub struct LooseArtifacts {
    pub manifest_path: PathBuf,
    pub file_list_path: PathBuf,
    pub listed_paths: usize,
}

/// Write `<base>.backup.json` and `<base>.backup.files`.
pub fn write_loose(base: &Path, manifest: &Manifest) -> Result<LooseArtifacts> {
    let manifest_path = with_suffix(base, LOOSE_MANIFEST_SUFFIX);
    let file_list_path = with_suffix(base, FILE_LIST_SUFFIX);

    let json = manifest.to_json_pretty()?;
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(&manifest_path)
        .map_err(|e| BackupError::fs(&manifest_path, e))?;
    file.write_all(&json)?;

    let paths = collect_paths(manifest.mounts.iter().map(|m| Path::new(&m.source)))?;
    let listed_paths = paths.len();

    let list = FileList {
        manifest: manifest_path.file_name().map(PathBuf::from),
        paths,
    };
    list.write(&file_list_path)?;

    println!("Created backup: {}", manifest_path.display());

    Ok(LooseArtifacts {
        manifest_path,
        file_list_path,
        listed_paths,
    })
}

/// Write `<base>.tar` (or `<base>.tar.zst`) holding the manifest and every
/// file and directory below the mount sources. Returns the archive path.
pub fn write_archive(base: &Path, manifest: &Manifest, options: &ArchiveOptions) -> Result<PathBuf> {
    let suffix = if options.compress { TAR_ZSTD_SUFFIX } else { TAR_SUFFIX };
    let path = with_suffix(base, suffix);
    let file = File::create(&path).map_err(|e| BackupError::fs(&path, e))?;

    if options.compress {
        let encoder = zstd::Encoder::new(file, options.compression_level)?;
        let mut builder = Builder::new(encoder);
        append_all(&mut builder, manifest, options.verbose)?;
        builder.into_inner()?.finish()?;
    } else {
        let mut builder = Builder::new(BufWriter::new(file));
        append_all(&mut builder, manifest, options.verbose)?;
        builder.into_inner()?.flush()?;
    }

    println!("Created backup: {}", path.display());
    Ok(path)
}

fn append_all<W: Write>(builder: &mut Builder<W>, manifest: &Manifest, verbose: bool) -> Result<()> {
    append_manifest(builder, manifest)?;

    for mount in &manifest.mounts {
        debug!("Mount (type {}) {} -> {}", mount.kind, mount.source, mount.destination);
        for visited in MountWalk::new(&mount.source).iter() {
            append_visited(builder, &visited?, verbose)?;
        }
    }

    builder.finish()?;
    Ok(())
}

fn append_manifest<W: Write>(builder: &mut Builder<W>, manifest: &Manifest) -> Result<()> {
    let json = manifest.to_json_pretty()?;

    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_size(json.len() as u64);
    header.set_mode(0o600);
    header.set_mtime(chrono::Utc::now().timestamp().max(0) as u64);

    builder.append_data(&mut header, ARCHIVE_MANIFEST_NAME, json.as_slice())?;
    Ok(())
}

fn append_visited<W: Write>(builder: &mut Builder<W>, visited: &VisitedPath, verbose: bool) -> Result<()> {
    let meta = &visited.metadata;
    let entry_type = match meta.kind {
        EntryKind::Directory => EntryType::Directory,
        EntryKind::File => EntryType::Regular,
        EntryKind::Symlink | EntryKind::Other => {
            warn!("Skipping {}: not a regular file or directory", visited.path.display());
            return Ok(());
        }
    };

    let name = archive_name(&visited.path);
    if name.as_os_str().is_empty() {
        warn!("Skipping filesystem root {}", visited.path.display());
        return Ok(());
    }

    if verbose {
        println!("Adding {}", visited.path.display());
    }

    let mut header = Header::new_gnu();
    header.set_entry_type(entry_type);
    header.set_mode(meta.mode);
    header.set_uid(meta.uid as u64);
    header.set_gid(meta.gid as u64);
    header.set_mtime(meta.mtime.max(0) as u64);

    let fs_err = |e| BackupError::fs(&visited.path, e);
    if entry_type == EntryType::Regular {
        // The file may have changed since the walk. The body must be exactly
        // the header size: cut or zero-padded.
        let file = File::open(&visited.path).map_err(fs_err)?;
        let size = file.metadata().map_err(fs_err)?.len();
        if size != meta.size {
            warn!(
                "{} changed size during backup ({} -> {} bytes)",
                visited.path.display(),
                meta.size,
                size
            );
        }
        header.set_size(size);
        let body = file.take(size).chain(io::repeat(0)).take(size);
        builder.append_data(&mut header, name, body).map_err(fs_err)?;
    } else {
        header.set_size(0);
        builder
            .append_data(&mut header, name, io::empty())
            .map_err(fs_err)?;
    }

    Ok(())
}
