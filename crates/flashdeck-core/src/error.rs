//! Error types for starting and running operations.

use std::path::PathBuf;

use thiserror::Error;

/// Reasons an operation start request is rejected before any task is spawned.
///
/// The display text doubles as the user-facing status message.
#[derive(Debug, Error)]
pub enum StartError {
    /// A copy is already in flight.
    #[error("Already copying...")]
    AlreadyCopying,

    /// An image operation was requested while a copy is in flight.
    #[error("Already processing...")]
    AlreadyProcessing,

    /// The destination's parent directory could not be created.
    #[error("Failed to create destination directory.")]
    CreateDestination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StartError {
    /// Whether the rejection was caused by another operation being busy.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::AlreadyCopying | Self::AlreadyProcessing)
    }
}

/// Errors raised inside a worker task.
///
/// These never cross the orchestrator boundary; the worker flattens them
/// into the message of its terminal outcome.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The copy engine reported a failure.
    #[error("Failed to copy {path}: {message}")]
    Copy { path: PathBuf, message: String },

    /// An archive could not be parsed.
    #[error("Invalid image archive {path}: {message}")]
    Archive { path: PathBuf, message: String },

    /// An archive was readable but contained no entries.
    #[error("Image archive is empty: {path}")]
    EmptyArchive { path: PathBuf },

    /// A zip package did not contain a tar archive.
    #[error("No tar archive found in package: {path}")]
    MissingTar { path: PathBuf },
}

impl WorkerError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Create an archive error with path context.
    pub fn archive(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Archive {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
