//! Incremental directory synchronization.
//!
//! Loose backups are restored by syncing each mount's backup directory onto
//! the new mount source. The transfer publishes its progress through a
//! `watch` channel that the progress reporter polls.

pub mod rsync;

use async_trait::async_trait;
use std::path::Path;
use tokio::sync::watch;

use crate::utils::Result;

pub use rsync::RsyncSync;

/// Progress of one directory transfer
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SyncState {
    /// Percent complete (0-100)
    pub progress: f64,

    /// Items still to check
    pub remain: u64,

    /// Items known so far
    pub total: u64,
}

#[async_trait]
pub trait DirSync: Send + Sync {
    /// Copy the tree at `source` onto `destination`, publishing progress to `state`.
    async fn sync(
        &self,
        source: &Path,
        destination: &Path,
        state: &watch::Sender<SyncState>,
    ) -> Result<()>;
}
