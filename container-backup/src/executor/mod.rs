//! Backup and restore pipelines.
//!
//! Each pipeline drives one container through the runtime, the archive
//! writer/reader and the replay engine. Blocking filesystem work is moved
//! onto tokio's blocking pool.

pub mod backup;
pub mod inspect;
pub mod restore;

pub use backup::{backup_all, backup_container, BackupArtifact, BackupOptions};
pub use inspect::{inspect_artifact, ArtifactInfo};
pub use restore::{materialize, restore, Materialized, ReplayOutcome, RestoreOptions, RestoreReport, RestoreStage};
