//! Long-lived operation state owned by the orchestrator.

use std::path::PathBuf;

use serde::Serialize;

use crate::CopyProgress;

/// Mutable state of the orchestrator.
///
/// Only the owning context mutates it. `is_copying` implies exactly one copy
/// task is active, and `pending_cleanup_dir` lives for one copy at most.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OperationState {
    /// A copy task is in flight.
    pub is_copying: bool,
    /// Human-readable status of the most recent operation.
    pub status: String,
    /// Bytes copied by the running copy.
    pub copied_size: u64,
    /// Total bytes of the running copy (0 if unknown).
    pub total_size: u64,
    /// Path of the most recently started delete.
    pub deleting_path: Option<PathBuf>,
    /// Directory to remove once the running copy finishes.
    pub pending_cleanup_dir: Option<PathBuf>,
}

impl OperationState {
    /// Create an idle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy progress as a truncated percentage, 0 when the total is unknown.
    pub fn progress_percent(&self) -> u32 {
        if self.total_size == 0 {
            return 0;
        }
        let copied = u128::from(self.copied_size.min(self.total_size));
        (copied * 100 / u128::from(self.total_size)) as u32
    }

    /// Reset counters for a newly accepted copy.
    pub fn begin_copy(&mut self, cleanup_dir: Option<PathBuf>) {
        self.is_copying = true;
        self.status = "Starting copy...".to_string();
        self.copied_size = 0;
        self.total_size = 0;
        self.pending_cleanup_dir = cleanup_dir;
    }

    /// Apply a copy progress event. Returns true if the total changed.
    pub fn apply_progress(&mut self, progress: CopyProgress) -> bool {
        let total_changed = self.total_size != progress.total;
        self.total_size = progress.total;
        self.copied_size = progress.copied;
        total_changed
    }
}
