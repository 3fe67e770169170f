//! The `.backup.files` path list written next to a loose manifest.
//!
//! One path per line. The first line names the manifest file itself; lists
//! written without that line are read as well.

use std::io::Write;
use std::path::{Path, PathBuf};

use super::LOOSE_MANIFEST_SUFFIX;
use crate::utils::{BackupError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileList {
    /// Manifest named on the first line, if the list has one
    pub manifest: Option<PathBuf>,
    pub paths: Vec<PathBuf>,
}

impl FileList {
    pub fn parse(contents: &str) -> Self {
        let mut lines = contents.lines().filter(|l| !l.is_empty()).peekable();

        let manifest = match lines.peek() {
            Some(first) if first.ends_with(LOOSE_MANIFEST_SUFFIX) => lines.next().map(PathBuf::from),
            _ => None,
        };

        Self {
            manifest,
            paths: lines.map(PathBuf::from).collect(),
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| BackupError::fs(path, e))?;
        Ok(Self::parse(&contents))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path).map_err(|e| BackupError::fs(path, e))?;
        let mut out = std::io::BufWriter::new(file);

        if let Some(manifest) = &self.manifest {
            writeln!(out, "{}", manifest.display())?;
        }
        for p in &self.paths {
            writeln!(out, "{}", p.display())?;
        }
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_manifest_line() {
        let list = FileList::parse("nginx-abc.backup.json\n/var/lib/v\n/var/lib/v/index.html\n");
        assert_eq!(list.manifest, Some(PathBuf::from("nginx-abc.backup.json")));
        assert_eq!(list.paths.len(), 2);
    }

    #[test]
    fn test_parse_without_manifest_line() {
        let list = FileList::parse("/var/lib/v\n/var/lib/v/index.html\n");
        assert_eq!(list.manifest, None);
        assert_eq!(list.paths, vec![PathBuf::from("/var/lib/v"), PathBuf::from("/var/lib/v/index.html")]);
    }

    #[test]
    fn test_write_then_read() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("x.backup.files");
        let list = FileList {
            manifest: Some(PathBuf::from("x.backup.json")),
            paths: vec![PathBuf::from("/srv/a"), PathBuf::from("/srv/a/b")],
        };
        list.write(&path)?;

        assert_eq!(std::fs::read_to_string(&path)?, "x.backup.json\n/srv/a\n/srv/a/b\n");
        assert_eq!(FileList::read(&path)?, list);
        Ok(())
    }
}
