//! Transfer progress tracking.

pub mod progress;
