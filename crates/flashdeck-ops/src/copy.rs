//! Blocking copy with byte progress.

use std::fs;
use std::path::Path;

use flashdeck_core::{CopyProgress, WorkerConfig, WorkerError};
use fs_extra::dir::{self, TransitProcessResult};
use fs_extra::file;

use crate::ProgressSink;

/// Copy a file, or the contents of a directory, to `destination`.
///
/// Returns the number of bytes copied.
pub(crate) fn copy_path(
    config: &WorkerConfig,
    source: &Path,
    destination: &Path,
    progress: &ProgressSink<CopyProgress>,
) -> Result<u64, WorkerError> {
    let metadata = fs::metadata(source).map_err(|e| WorkerError::io(source, e))?;

    if metadata.is_dir() {
        copy_dir(config, source, destination, progress)
    } else {
        copy_file(config, source, destination, progress)
    }
}

fn copy_file(
    config: &WorkerConfig,
    source: &Path,
    destination: &Path,
    progress: &ProgressSink<CopyProgress>,
) -> Result<u64, WorkerError> {
    let mut options = file::CopyOptions::new();
    options.overwrite = config.overwrite;
    options.buffer_size = config.io_buffer_len();

    file::copy_with_progress(source, destination, &options, |transit| {
        progress.report(CopyProgress::new(transit.copied_bytes, transit.total_bytes));
    })
    .map_err(|e| WorkerError::Copy {
        path: source.to_path_buf(),
        message: e.to_string(),
    })
}

fn copy_dir(
    config: &WorkerConfig,
    source: &Path,
    destination: &Path,
    progress: &ProgressSink<CopyProgress>,
) -> Result<u64, WorkerError> {
    fs::create_dir_all(destination).map_err(|e| WorkerError::io(destination, e))?;

    let mut options = dir::CopyOptions::new();
    options.overwrite = config.overwrite;
    options.buffer_size = config.io_buffer_len();
    options.content_only = true;

    dir::copy_with_progress(source, destination, &options, |transit| {
        progress.report(CopyProgress::new(transit.copied_bytes, transit.total_bytes));
        TransitProcessResult::ContinueOrAbort
    })
    .map_err(|e| WorkerError::Copy {
        path: source.to_path_buf(),
        message: e.to_string(),
    })
}
