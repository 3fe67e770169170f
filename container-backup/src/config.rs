//! Configuration management for container backup.
//!
//! Loads configuration from a TOML file. Every section and field has a
//! default, and command-line flags override whatever the file sets.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backup: BackupConfig,
    pub restore: RestoreConfig,
    pub sync: SyncConfig,
    pub runtime: RuntimeConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Directory the artifacts are written to
    pub output_dir: PathBuf,

    /// Write a single tar archive instead of a manifest plus file list
    pub tar: bool,

    /// Compress tar archives with zstd
    pub compress: bool,

    /// Compression level (1-22 for zstd)
    pub compression_level: i32,

    /// Print one line per archived path
    pub verbose: bool,

    /// Resolve untagged image references against the local image index
    pub resolve_tags: bool,

    /// External command run after a loose backup (`%tag`, `%list` are substituted)
    pub launch: Option<String>,

    /// With `--all`: include stopped containers
    pub include_stopped: bool,

    /// With `--all`: keep going after a container fails
    pub keep_going: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestoreConfig {
    /// Start the container once its files are restored
    pub start: bool,

    /// Mount sources starting with any of these prefixes are not restored
    pub exclude: Vec<String>,

    /// Keep replaying after a failed archive entry
    pub continue_on_error: bool,

    /// Apply the archived uid/gid to restored paths
    pub preserve_ownership: bool,

    /// What to do with archive entries that are neither files nor directories
    pub unsupported_entries: UnsupportedEntryPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnsupportedEntryPolicy {
    #[default]
    Skip,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// rsync binary used for loose-file restores
    pub rsync_path: PathBuf,

    /// Extra arguments passed to rsync before the source and destination
    pub extra_args: Vec<String>,

    /// Progress reporting cadence in milliseconds
    pub progress_interval_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Docker socket path (local defaults when unset)
    pub socket: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            tar: false,
            compress: false,
            compression_level: 3,
            verbose: false,
            resolve_tags: true,
            launch: None,
            include_stopped: false,
            keep_going: false,
        }
    }
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            start: false,
            exclude: Vec::new(),
            continue_on_error: false,
            preserve_ownership: true,
            unsupported_entries: UnsupportedEntryPolicy::Skip,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            rsync_path: PathBuf::from("rsync"),
            extra_args: Vec::new(),
            progress_interval_ms: 1000,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
