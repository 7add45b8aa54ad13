//! The filesystem-backed worker.

use std::path::Path;

use flashdeck_core::{
    CopyProgress, FailedOutcome, ImageInfo, ImageReport, StageProgress, TaskOutcome,
    ValidationOutcome, WorkerConfig, UNKNOWN_VERSION,
};

use crate::copy::copy_path;
use crate::delete::delete_path;
use crate::image::{self, image_name, Span};
use crate::{ProgressSink, Worker};

const LABEL_READING_INFO: &str = "Reading image info";

/// Share of the combined task spent reading image info.
const INFO_SHARE: u8 = 10;

/// Worker that performs operations directly on the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct FsWorker {
    config: WorkerConfig,
}

impl FsWorker {
    /// Create a worker with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a worker with the given configuration.
    pub fn with_config(config: WorkerConfig) -> Self {
        Self { config }
    }

    /// The worker's configuration.
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    fn validate_span(
        &self,
        path: &Path,
        progress: &ProgressSink<StageProgress>,
        span: Span,
    ) -> ValidationOutcome {
        match image::validate(&self.config, path, progress, span) {
            Ok(archive) => ValidationOutcome::succeeded("Image validated.", image_name(path), archive),
            Err(e) => ValidationOutcome::failed(e.to_string()),
        }
    }
}

impl Worker for FsWorker {
    fn copy(
        &self,
        source: &Path,
        destination: &Path,
        progress: &ProgressSink<CopyProgress>,
    ) -> TaskOutcome {
        match copy_path(&self.config, source, destination, progress) {
            Ok(_) => TaskOutcome::succeeded("Copy completed."),
            Err(e) => TaskOutcome::failed(e.to_string()),
        }
    }

    fn delete(&self, path: &Path) -> TaskOutcome {
        match delete_path(&self.config, path) {
            Ok(()) => TaskOutcome::succeeded("Delete completed."),
            Err(e) => TaskOutcome::failed(e.to_string()),
        }
    }

    fn validate_image(
        &self,
        path: &Path,
        progress: &ProgressSink<StageProgress>,
    ) -> ValidationOutcome {
        self.validate_span(path, progress, Span::FULL)
    }

    fn extract_image_info(&self, path: &Path) -> ImageInfo {
        match image::read_android_version(path) {
            Ok(version) => ImageInfo::succeeded(
                image_name(path),
                version.unwrap_or_else(|| UNKNOWN_VERSION.to_string()),
            ),
            Err(e) => ImageInfo::failed(e.to_string()),
        }
    }

    fn extract_and_validate(
        &self,
        path: &Path,
        progress: &ProgressSink<StageProgress>,
    ) -> ImageReport {
        progress.report(StageProgress::new(LABEL_READING_INFO, 0));

        let info = self.extract_image_info(path);
        if !info.success {
            return ImageReport::failed(info.error_message);
        }
        progress.report(StageProgress::new(LABEL_READING_INFO, INFO_SHARE));

        let validation = self.validate_span(path, progress, Span::new(INFO_SHARE, 100));
        ImageReport::from_parts(info, validation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_tar(path: &Path, props: Option<&str>) {
        let mut builder = tar::Builder::new(fs::File::create(path).unwrap());
        let mut header = tar::Header::new_gnu();
        header.set_size(2048);
        builder
            .append_data(&mut header, "boot.img", [1u8; 2048].as_slice())
            .unwrap();
        if let Some(props) = props {
            let mut header = tar::Header::new_gnu();
            header.set_size(props.len() as u64);
            builder
                .append_data(&mut header, "system/build.prop", props.as_bytes())
                .unwrap();
        }
        builder.finish().unwrap();
    }

    #[test]
    fn test_copy_and_delete_messages() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("a.bin");
        let destination = temp.path().join("b.bin");
        fs::write(&source, b"abc").unwrap();

        let worker = FsWorker::new();
        let outcome = worker.copy(&source, &destination, &ProgressSink::discard());
        assert_eq!(outcome, TaskOutcome::succeeded("Copy completed."));

        let outcome = worker.delete(&destination);
        assert_eq!(outcome, TaskOutcome::succeeded("Delete completed."));

        let outcome = worker.delete(&destination);
        assert!(!outcome.success);
        assert!(outcome.message.contains("Path not found"));
    }

    #[test]
    fn test_extract_image_info() {
        let temp = TempDir::new().unwrap();
        let with_props = temp.path().join("AP_firmware.tar.md5");
        let without_props = temp.path().join("plain.tar");
        write_tar(&with_props, Some("ro.build.version.release=14\n"));
        write_tar(&without_props, None);

        let worker = FsWorker::new();
        assert_eq!(
            worker.extract_image_info(&with_props),
            ImageInfo::succeeded("AP_firmware", "14")
        );
        assert_eq!(
            worker.extract_image_info(&without_props),
            ImageInfo::succeeded("plain", UNKNOWN_VERSION)
        );

        let missing = worker.extract_image_info(&temp.path().join("missing.tar"));
        assert!(!missing.success);
        assert!(!missing.error_message.is_empty());
    }

    #[test]
    fn test_extract_and_validate() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("firmware.tar");
        write_tar(&path, Some("ro.build.version.release=13\n"));

        let report = FsWorker::new().extract_and_validate(&path, &ProgressSink::discard());
        assert!(report.success, "{}", report.message);
        assert_eq!(report.image_name, "firmware");
        assert_eq!(report.android_version, "13");
        assert_eq!(report.archive_path, Some(path));
    }

    #[test]
    fn test_extract_and_validate_bad_archive() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.tar");
        fs::write(&path, vec![0xffu8; 1024]).unwrap();

        let report = FsWorker::new().extract_and_validate(&path, &ProgressSink::discard());
        assert!(!report.success);
        assert!(report.archive_path.is_none());
    }
}
