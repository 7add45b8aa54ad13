//! Storage queries for flashdeck.
//!
//! This crate resolves paths to the root of their containing volume,
//! reports the space available there and the size of single files, and
//! provides the best-effort temp directory cleanup run after copies.

mod cleanup;
mod query;
mod volume;

pub use cleanup::{cleanup_temp_dir, CleanupFailure, CleanupReport, CleanupStep};
pub use query::{file_size, StorageQuery, StorageRoot};
pub use volume::{
    DriveLetterRoot, MountPointRoot, PlatformRoot, RootStrategy, SystemVolumes, Volume,
    VolumeSource,
};
