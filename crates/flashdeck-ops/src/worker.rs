//! The worker task contract.

use std::path::Path;

use flashdeck_core::{
    CopyProgress, ImageInfo, ImageReport, StageProgress, TaskOutcome, ValidationOutcome,
};

/// An event emitted by a running task: zero or more progress updates,
/// followed by exactly one terminal result.
#[derive(Debug)]
pub enum TaskEvent<P, R> {
    /// Progress update.
    Progress(P),
    /// The task finished.
    Finished(R),
}

/// Receives progress updates from a task running on a background thread.
pub struct ProgressSink<P> {
    report: Box<dyn Fn(P) + Send + Sync>,
}

impl<P> ProgressSink<P> {
    /// Create a sink that forwards every update to `report`.
    pub fn new(report: impl Fn(P) + Send + Sync + 'static) -> Self {
        Self {
            report: Box::new(report),
        }
    }

    /// A sink that drops every update.
    pub fn discard() -> Self {
        Self::new(|_| {})
    }

    /// Report one progress update.
    pub fn report(&self, progress: P) {
        (self.report)(progress);
    }
}

impl<P> std::fmt::Debug for ProgressSink<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSink").finish_non_exhaustive()
    }
}

/// Executes the byte-level work behind each operation.
///
/// Every method runs to completion on a blocking thread and returns its
/// terminal outcome by value, so each task yields exactly one result.
/// Progress goes through the sink before the method returns.
pub trait Worker: Send + Sync + 'static {
    /// Copy `source` to `destination`, reporting non-decreasing byte counts.
    fn copy(
        &self,
        source: &Path,
        destination: &Path,
        progress: &ProgressSink<CopyProgress>,
    ) -> TaskOutcome;

    /// Delete the file or directory at `path`.
    fn delete(&self, path: &Path) -> TaskOutcome;

    /// Validate the disk image at `path`.
    fn validate_image(
        &self,
        path: &Path,
        progress: &ProgressSink<StageProgress>,
    ) -> ValidationOutcome;

    /// Read the image name and Android version of the disk image at `path`.
    fn extract_image_info(&self, path: &Path) -> ImageInfo;

    /// Read image info, then validate the disk image at `path`.
    fn extract_and_validate(
        &self,
        path: &Path,
        progress: &ProgressSink<StageProgress>,
    ) -> ImageReport;
}
