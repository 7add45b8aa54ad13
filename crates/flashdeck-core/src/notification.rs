//! Public notifications published by the orchestrator.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::OperationKind;

/// An event consumed by the caller or UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notification {
    /// The copy-in-flight flag changed.
    IsCopyingChanged(bool),
    /// The status text changed.
    StatusChanged(String),
    /// Copy progress changed; carries the new percentage.
    ProgressChanged(u32),
    /// The total size of the running copy changed.
    TotalSizeChanged(u64),

    /// A start request was rejected because another operation is busy.
    StartRejected { kind: OperationKind, reason: String },

    CopySucceeded,
    CopyFailed { message: String },

    DeleteSucceeded { path: PathBuf },
    DeleteFailed { message: String },

    /// Progress shared by validation and combined extract-and-validate.
    ValidationProgress { label: String, percent: u8 },
    ValidationSucceeded {
        image_name: String,
        archive_path: Option<PathBuf>,
    },
    ValidationFailed { message: String },

    ImageInfoExtracted {
        success: bool,
        image_name: String,
        android_version: String,
        error_message: String,
    },

    ImageInfoAndValidationCompleted {
        success: bool,
        message: String,
        image_name: String,
        android_version: String,
        archive_path: Option<PathBuf>,
    },
}

impl Notification {
    /// Whether this notification ends an operation.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::CopySucceeded
                | Self::CopyFailed { .. }
                | Self::DeleteSucceeded { .. }
                | Self::DeleteFailed { .. }
                | Self::ValidationSucceeded { .. }
                | Self::ValidationFailed { .. }
                | Self::ImageInfoExtracted { .. }
                | Self::ImageInfoAndValidationCompleted { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_notifications() {
        assert!(Notification::CopySucceeded.is_terminal());
        assert!(
            Notification::DeleteFailed {
                message: "gone".into()
            }
            .is_terminal()
        );
        assert!(!Notification::ProgressChanged(40).is_terminal());
        assert!(
            !Notification::ValidationProgress {
                label: "Reading".into(),
                percent: 10
            }
            .is_terminal()
        );
    }

    #[test]
    fn test_notification_serializes() {
        let json = serde_json::to_string(&Notification::DeleteSucceeded {
            path: PathBuf::from("/data/a.tar"),
        })
        .unwrap();
        assert!(json.contains("DeleteSucceeded"));
        assert!(json.contains("/data/a.tar"));
    }
}
