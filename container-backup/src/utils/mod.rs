//! Utility modules for container backup.

pub mod errors;
pub mod logger;
pub mod naming;

pub use errors::{BackupError, Result};
