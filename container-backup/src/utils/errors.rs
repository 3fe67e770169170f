//! Custom error types for container backup and restore.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Archive {} has no container.json entry", .0.display())]
    MissingManifest(PathBuf),

    #[error("Unknown backup artifact {}, expected a .json, .tar or .tar.zst file", .0.display())]
    UnknownArtifact(PathBuf),

    #[error("Unsupported archive entry {path} ({kind})")]
    UnsupportedEntry { path: String, kind: String },

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Sync error: {0}")]
    Sync(String),

    #[error("Launch command failed: {0}")]
    Launch(String),

    #[error("{failed} of {total} container backups failed")]
    Batch { failed: usize, total: usize },

    #[error("{failed} archive entries could not be restored")]
    Replay { failed: usize },
}

impl BackupError {
    /// Attach the offending path to an I/O error.
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BackupError::Filesystem {
            path: path.into(),
            source,
        }
    }
}

impl From<bollard::errors::Error> for BackupError {
    fn from(err: bollard::errors::Error) -> Self {
        BackupError::Runtime(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
