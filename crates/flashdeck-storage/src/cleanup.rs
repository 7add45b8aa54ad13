//! Best-effort removal of temporary directories.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

/// The cleanup step during which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CleanupStep {
    /// Listing the directory contents.
    List,
    /// Removing a file directly inside the directory.
    RemoveFile,
    /// Recursively removing a direct subdirectory.
    RemoveSubdirectory,
    /// Recursively removing the directory itself.
    RemoveRoot,
    /// Non-recursive removal of the directory after the recursive one failed.
    ForceRemoveRoot,
}

/// A failure recorded during cleanup.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupFailure {
    pub path: PathBuf,
    pub step: CleanupStep,
    pub message: String,
}

/// What a cleanup attempt did. Diagnostic only.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    /// The directory that was cleaned.
    pub root: PathBuf,
    /// Whether the directory existed when cleanup started.
    pub existed: bool,
    /// Whether the directory is gone afterwards.
    pub removed: bool,
    /// Whether the non-recursive fallback removed the directory.
    pub forced: bool,
    /// Every failure encountered, in order.
    pub failures: Vec<CleanupFailure>,
}

impl CleanupReport {
    fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            existed: false,
            removed: false,
            forced: false,
            failures: Vec::new(),
        }
    }

    /// Whether cleanup finished without recording any failure.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, path: &Path, step: CleanupStep, error: &std::io::Error) {
        warn!(path = %path.display(), ?step, %error, "Cleanup step failed");
        self.failures.push(CleanupFailure {
            path: path.to_path_buf(),
            step,
            message: error.to_string(),
        });
    }
}

/// The removals cleanup performs, so a failing step can be substituted.
pub(crate) trait Remover {
    fn remove_file(&self, path: &Path) -> std::io::Result<()>;
    fn remove_dir_all(&self, path: &Path) -> std::io::Result<()>;
    fn remove_dir(&self, path: &Path) -> std::io::Result<()>;
}

/// Removes through `std::fs`.
struct FsRemover;

impl Remover for FsRemover {
    fn remove_file(&self, path: &Path) -> std::io::Result<()> {
        fs::remove_file(path)
    }

    fn remove_dir_all(&self, path: &Path) -> std::io::Result<()> {
        fs::remove_dir_all(path)
    }

    fn remove_dir(&self, path: &Path) -> std::io::Result<()> {
        fs::remove_dir(path)
    }
}

/// Remove `dir` and everything under it, continuing past failures.
///
/// Files directly inside `dir` go first, then each subdirectory, then
/// `dir` itself. If the recursive removal of `dir` fails, a single
/// non-recursive removal is attempted. Nothing is ever propagated; all
/// failures land in the returned report.
pub fn cleanup_temp_dir(dir: &Path) -> CleanupReport {
    cleanup_with(&FsRemover, dir)
}

pub(crate) fn cleanup_with(remover: &impl Remover, dir: &Path) -> CleanupReport {
    let mut report = CleanupReport::new(dir);

    if !dir.is_dir() {
        debug!(path = %dir.display(), "Temporary directory does not exist");
        return report;
    }
    report.existed = true;

    let (files, subdirs) = match list_entries(dir) {
        Ok(entries) => entries,
        Err(e) => {
            report.record(dir, CleanupStep::List, &e);
            (Vec::new(), Vec::new())
        }
    };

    for file in files {
        if let Err(e) = remover.remove_file(&file) {
            report.record(&file, CleanupStep::RemoveFile, &e);
        }
    }

    for subdir in subdirs {
        if let Err(e) = remover.remove_dir_all(&subdir) {
            report.record(&subdir, CleanupStep::RemoveSubdirectory, &e);
        }
    }

    match remover.remove_dir_all(dir) {
        Ok(()) => {
            report.removed = true;
        }
        Err(e) => {
            report.record(dir, CleanupStep::RemoveRoot, &e);
            match remover.remove_dir(dir) {
                Ok(()) => {
                    report.removed = true;
                    report.forced = true;
                }
                Err(e) => report.record(dir, CleanupStep::ForceRemoveRoot, &e),
            }
        }
    }

    if report.removed {
        info!(
            path = %dir.display(),
            failures = report.failures.len(),
            "Cleaned up temporary directory"
        );
    }

    report
}

/// Split the direct children of `dir` into non-directories and directories.
///
/// Symlinks count as files so they are unlinked, never followed.
fn list_entries(dir: &Path) -> std::io::Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut files = Vec::new();
    let mut subdirs = Vec::new();

    for entry in fs::read_dir(dir)?.flatten() {
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir {
            subdirs.push(entry.path());
        } else {
            files.push(entry.path());
        }
    }

    Ok((files, subdirs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Fails recursive removal of the listed paths and records every call.
    #[derive(Default)]
    struct FlakyRemover {
        fail_recursive: Vec<PathBuf>,
        calls: RefCell<Vec<(&'static str, PathBuf)>>,
    }

    impl FlakyRemover {
        fn failing(paths: &[&Path]) -> Self {
            Self {
                fail_recursive: paths.iter().map(|p| p.to_path_buf()).collect(),
                ..Self::default()
            }
        }

        fn call_kinds(&self) -> Vec<&'static str> {
            self.calls.borrow().iter().map(|(kind, _)| *kind).collect()
        }
    }

    impl Remover for FlakyRemover {
        fn remove_file(&self, path: &Path) -> std::io::Result<()> {
            self.calls.borrow_mut().push(("file", path.to_path_buf()));
            fs::remove_file(path)
        }

        fn remove_dir_all(&self, path: &Path) -> std::io::Result<()> {
            self.calls.borrow_mut().push(("dir_all", path.to_path_buf()));
            if self.fail_recursive.iter().any(|p| p == path) {
                return Err(std::io::Error::other("injected failure"));
            }
            fs::remove_dir_all(path)
        }

        fn remove_dir(&self, path: &Path) -> std::io::Result<()> {
            self.calls.borrow_mut().push(("dir", path.to_path_buf()));
            fs::remove_dir(path)
        }
    }

    #[test]
    fn test_cleanup_falls_back_to_plain_remove_dir() {
        let temp = TempDir::new().unwrap();
        let stage = temp.path().join("stage");
        fs::create_dir_all(stage.join("sub/deep")).unwrap();
        fs::write(stage.join("a.tar"), b"a").unwrap();
        fs::write(stage.join("sub/deep/b.img"), b"b").unwrap();

        let remover = FlakyRemover::failing(&[stage.as_path()]);
        let report = cleanup_with(&remover, &stage);

        assert!(report.existed);
        assert!(report.removed);
        assert!(report.forced);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].step, CleanupStep::RemoveRoot);
        assert!(!stage.exists());

        assert_eq!(remover.call_kinds(), vec!["file", "dir_all", "dir_all", "dir"]);
        let calls = remover.calls.borrow();
        assert_eq!(calls[1].1, stage.join("sub"));
        assert_eq!(calls[2].1, stage);
        assert_eq!(calls[3].1, stage);
    }

    #[test]
    fn test_cleanup_continues_after_failed_subdirectory() {
        let temp = TempDir::new().unwrap();
        let stage = temp.path().join("stage");
        let stuck = stage.join("stuck");
        let other = stage.join("other");
        fs::create_dir_all(&stuck).unwrap();
        fs::create_dir_all(&other).unwrap();
        fs::write(stuck.join("x.img"), b"x").unwrap();
        fs::write(other.join("y.img"), b"y").unwrap();
        fs::write(stage.join("z.tar"), b"z").unwrap();

        let remover = FlakyRemover::failing(&[stuck.as_path(), stage.as_path()]);
        let report = cleanup_with(&remover, &stage);

        let steps: Vec<CleanupStep> = report.failures.iter().map(|f| f.step).collect();
        assert_eq!(
            steps,
            vec![
                CleanupStep::RemoveSubdirectory,
                CleanupStep::RemoveRoot,
                CleanupStep::ForceRemoveRoot,
            ]
        );
        assert_eq!(report.failures[0].path, stuck);
        assert!(!report.removed);
        assert!(!report.forced);

        assert!(!stage.join("z.tar").exists());
        assert!(!other.exists());
        assert!(stuck.join("x.img").exists());
    }

    #[test]
    fn test_cleanup_missing_dir_is_noop() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("never-created");

        let report = cleanup_temp_dir(&missing);
        assert!(!report.existed);
        assert!(!report.removed);
        assert!(report.is_clean());
    }

    #[test]
    fn test_list_entries_splits_files_and_dirs() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.bin"), b"a").unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();

        let (files, subdirs) = list_entries(temp.path()).unwrap();
        assert_eq!(files, vec![temp.path().join("a.bin")]);
        assert_eq!(subdirs, vec![temp.path().join("sub")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_cleanup_does_not_follow_symlinks() {
        let temp = TempDir::new().unwrap();
        let outside = temp.path().join("outside");
        fs::create_dir(&outside).unwrap();
        fs::write(outside.join("keep.txt"), b"keep").unwrap();

        let stage = temp.path().join("stage");
        fs::create_dir(&stage).unwrap();
        std::os::unix::fs::symlink(&outside, stage.join("link")).unwrap();

        let report = cleanup_temp_dir(&stage);
        assert!(report.removed);
        assert!(!stage.exists());
        assert!(outside.join("keep.txt").exists());
    }
}
