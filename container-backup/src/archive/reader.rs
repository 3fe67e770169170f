//! Reads manifests back out of backup artifacts.
//!
//! Restoring an archive takes two passes over the file. The first pass,
//! [`read_manifest`], stops as soon as the manifest entry is found. The
//! replay pass opens the archive again from the start once the remap table
//! is known, so the archive is never buffered in memory.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tar::Archive;

use super::ArtifactKind;
use crate::manifest::{Manifest, ARCHIVE_MANIFEST_NAME};
use crate::utils::{BackupError, Result};

/// Open a `.tar` or `.tar.zst` artifact positioned at its first entry.
pub fn open_archive(path: &Path) -> Result<Archive<Box<dyn Read>>> {
    let kind = ArtifactKind::detect(path)?;
    let file = File::open(path).map_err(|e| BackupError::fs(path, e))?;

    let reader: Box<dyn Read> = match kind {
        ArtifactKind::TarZstd => Box::new(zstd::Decoder::new(file)?),
        ArtifactKind::Tar => Box::new(BufReader::new(file)),
        ArtifactKind::Loose => return Err(BackupError::UnknownArtifact(path.to_path_buf())),
    };
    Ok(Archive::new(reader))
}

/// Whether an archive entry name is the embedded manifest.
pub fn is_manifest_entry(name: &Path) -> bool {
    name == Path::new(ARCHIVE_MANIFEST_NAME)
}

/// First pass: extract the manifest entry of an archive.
pub fn read_manifest(path: &Path) -> Result<Manifest> {
    let mut archive = open_archive(path)?;

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !is_manifest_entry(&entry.path()?) {
            continue;
        }

        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes)?;
        return Manifest::from_json(&bytes);
    }

    Err(BackupError::MissingManifest(path.to_path_buf()))
}

/// Load a manifest from any artifact kind.
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    match ArtifactKind::detect(path)? {
        ArtifactKind::Loose => Manifest::from_file(path),
        ArtifactKind::Tar | ArtifactKind::TarZstd => read_manifest(path),
    }
}
