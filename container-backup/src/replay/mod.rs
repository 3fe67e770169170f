//! Replay backed-up data onto the mounts of a restored container.
//!
//! Archives are replayed entry by entry ([`archive`]); loose backups are
//! synced mount by mount ([`loose`]). Both consult a
//! [`RemapTable`](crate::remap::RemapTable) to move data from the old mount
//! sources to the new ones.

pub mod archive;
pub mod loose;

use crate::config::{RestoreConfig, UnsupportedEntryPolicy};

pub use archive::replay_archive;
pub use loose::{replay_loose, LooseSummary};

/// Knobs for archive replay
#[derive(Debug, Clone, Copy)]
pub struct ReplayOptions {
    /// Apply the stored uid/gid to every restored entry
    pub preserve_ownership: bool,

    /// Count failing entries and keep going instead of aborting
    pub continue_on_error: bool,

    pub unsupported_entries: UnsupportedEntryPolicy,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            preserve_ownership: true,
            continue_on_error: false,
            unsupported_entries: UnsupportedEntryPolicy::Skip,
        }
    }
}

impl From<&RestoreConfig> for ReplayOptions {
    fn from(config: &RestoreConfig) -> Self {
        Self {
            preserve_ownership: config.preserve_ownership,
            continue_on_error: config.continue_on_error,
            unsupported_entries: config.unsupported_entries,
        }
    }
}

/// Entry counts of one archive replay
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub restored: usize,
    pub skipped: usize,
    pub failed: usize,
}
