//! Operation requests.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum::Display;

/// Identifier assigned to every accepted operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationId(pub u64);

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

/// The kind of operation being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum OperationKind {
    #[strum(to_string = "Copy")]
    Copy,
    #[strum(to_string = "Delete")]
    Delete,
    #[strum(to_string = "Validate image")]
    Validate,
    #[strum(to_string = "Extract image info")]
    ExtractInfo,
    #[strum(to_string = "Extract and validate image")]
    ExtractAndValidate,
}

/// A request to start one background operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OperationRequest {
    /// Copy a file or directory to a destination path.
    Copy {
        source: PathBuf,
        destination: PathBuf,
        cleanup_dir: Option<PathBuf>,
    },
    /// Delete a file or directory.
    Delete { path: PathBuf },
    /// Validate a disk image archive.
    Validate { path: PathBuf },
    /// Read the name and Android version of a disk image.
    ExtractInfo { path: PathBuf },
    /// Read image info, then validate the archive.
    ExtractAndValidate { path: PathBuf },
}

impl OperationRequest {
    /// Create a copy request.
    pub fn copy(
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        cleanup_dir: Option<PathBuf>,
    ) -> Self {
        Self::Copy {
            source: source.into(),
            destination: destination.into(),
            cleanup_dir: cleanup_dir.filter(|dir| !dir.as_os_str().is_empty()),
        }
    }

    /// Create a delete request.
    pub fn delete(path: impl Into<PathBuf>) -> Self {
        Self::Delete { path: path.into() }
    }

    /// Create an image validation request.
    pub fn validate(path: impl Into<PathBuf>) -> Self {
        Self::Validate { path: path.into() }
    }

    /// Create an image info extraction request.
    pub fn extract_info(path: impl Into<PathBuf>) -> Self {
        Self::ExtractInfo { path: path.into() }
    }

    /// Create a combined extract-and-validate request.
    pub fn extract_and_validate(path: impl Into<PathBuf>) -> Self {
        Self::ExtractAndValidate { path: path.into() }
    }

    /// The kind of this request.
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Copy { .. } => OperationKind::Copy,
            Self::Delete { .. } => OperationKind::Delete,
            Self::Validate { .. } => OperationKind::Validate,
            Self::ExtractInfo { .. } => OperationKind::ExtractInfo,
            Self::ExtractAndValidate { .. } => OperationKind::ExtractAndValidate,
        }
    }

    /// The primary path the request acts on.
    pub fn target(&self) -> &Path {
        match self {
            Self::Copy { source, .. } => source,
            Self::Delete { path }
            | Self::Validate { path }
            | Self::ExtractInfo { path }
            | Self::ExtractAndValidate { path } => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_request_drops_empty_cleanup_dir() {
        let request = OperationRequest::copy("/src", "/dst", Some(PathBuf::new()));
        assert!(matches!(
            request,
            OperationRequest::Copy {
                cleanup_dir: None,
                ..
            }
        ));

        let request = OperationRequest::copy("/src", "/dst", Some(PathBuf::from("/tmp/x")));
        assert!(matches!(
            request,
            OperationRequest::Copy {
                cleanup_dir: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn test_request_kind_and_target() {
        let request = OperationRequest::delete("/data/image.tar");
        assert_eq!(request.kind(), OperationKind::Delete);
        assert_eq!(request.target(), Path::new("/data/image.tar"));

        let request = OperationRequest::copy("/src", "/dst", None);
        assert_eq!(request.kind(), OperationKind::Copy);
        assert_eq!(request.target(), Path::new("/src"));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(OperationKind::Copy.to_string(), "Copy");
        assert_eq!(
            OperationKind::ExtractAndValidate.to_string(),
            "Extract and validate image"
        );
        assert_eq!(OperationId(7).to_string(), "op#7");
    }
}
