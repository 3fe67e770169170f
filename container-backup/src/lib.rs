//! Container Backup Library
//!
//! Snapshots a container's configuration and mounted data, and restores it
//! into a new container whose mounts may live at different host paths.

pub mod archive;
pub mod config;
pub mod executor;
pub mod fs;
pub mod manifest;
pub mod remap;
pub mod replay;
pub mod runtime;
pub mod sync;
pub mod transfer;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use utils::errors::BackupError;
pub use utils::errors::Result;
