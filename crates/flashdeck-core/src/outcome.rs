//! Progress events and terminal outcomes produced by worker tasks.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Byte progress of a copy task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CopyProgress {
    /// Bytes copied so far.
    pub copied: u64,
    /// Total bytes to copy (0 if not yet known).
    pub total: u64,
}

impl CopyProgress {
    pub fn new(copied: u64, total: u64) -> Self {
        Self { copied, total }
    }
}

/// Labelled progress of an image task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageProgress {
    /// What the task is currently doing.
    pub label: String,
    /// Percentage complete, 0 to 100.
    pub percent: u8,
}

impl StageProgress {
    pub fn new(label: impl Into<String>, percent: u8) -> Self {
        Self {
            label: label.into(),
            percent: percent.min(100),
        }
    }
}

/// Outcomes that can be synthesized from a failure message.
///
/// Used when a worker task dies without producing its own outcome.
pub trait FailedOutcome {
    fn failed(message: impl Into<String>) -> Self;
}

/// Terminal result of a copy or delete task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub success: bool,
    pub message: String,
}

impl TaskOutcome {
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

impl FailedOutcome for TaskOutcome {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Terminal result of an image validation task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub success: bool,
    pub message: String,
    /// Image name derived from the archive file name.
    pub image_name: String,
    /// The tar archive that was validated.
    pub archive_path: Option<PathBuf>,
}

impl ValidationOutcome {
    pub fn succeeded(
        message: impl Into<String>,
        image_name: impl Into<String>,
        archive_path: PathBuf,
    ) -> Self {
        Self {
            success: true,
            message: message.into(),
            image_name: image_name.into(),
            archive_path: Some(archive_path),
        }
    }
}

impl FailedOutcome for ValidationOutcome {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            image_name: String::new(),
            archive_path: None,
        }
    }
}

/// Terminal result of an image info extraction task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub success: bool,
    pub image_name: String,
    pub android_version: String,
    pub error_message: String,
}

impl ImageInfo {
    pub fn succeeded(image_name: impl Into<String>, android_version: impl Into<String>) -> Self {
        Self {
            success: true,
            image_name: image_name.into(),
            android_version: android_version.into(),
            error_message: String::new(),
        }
    }
}

impl FailedOutcome for ImageInfo {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            image_name: String::new(),
            android_version: String::new(),
            error_message: message.into(),
        }
    }
}

/// Terminal result of a combined extract-and-validate task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReport {
    pub success: bool,
    pub message: String,
    pub image_name: String,
    pub android_version: String,
    pub archive_path: Option<PathBuf>,
}

impl ImageReport {
    /// Combine an info extraction with the validation that followed it.
    pub fn from_parts(info: ImageInfo, validation: ValidationOutcome) -> Self {
        Self {
            success: info.success && validation.success,
            message: validation.message,
            image_name: if info.image_name.is_empty() {
                validation.image_name
            } else {
                info.image_name
            },
            android_version: info.android_version,
            archive_path: validation.archive_path,
        }
    }
}

impl FailedOutcome for ImageReport {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            image_name: String::new(),
            android_version: String::new(),
            archive_path: None,
        }
    }
}
