//! Blocking delete.

use std::fs;
use std::path::Path;

use flashdeck_core::{WorkerConfig, WorkerError};

/// Delete a file or directory, or move it to the trash when configured.
pub(crate) fn delete_path(config: &WorkerConfig, path: &Path) -> Result<(), WorkerError> {
    let metadata = fs::symlink_metadata(path).map_err(|e| WorkerError::io(path, e))?;

    if config.use_trash {
        return trash::delete(path).map_err(|e| WorkerError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::other(e.to_string()),
        });
    }

    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    result.map_err(|e| WorkerError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_delete_file_and_directory() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("image.tar");
        let dir = temp.path().join("extracted");
        fs::write(&file, b"data").unwrap();
        fs::create_dir_all(dir.join("inner")).unwrap();
        fs::write(dir.join("inner/system.img"), b"img").unwrap();

        delete_path(&WorkerConfig::default(), &file).unwrap();
        delete_path(&WorkerConfig::default(), &dir).unwrap();

        assert!(!file.exists());
        assert!(!dir.exists());
    }

    #[test]
    fn test_delete_missing_path() {
        let temp = TempDir::new().unwrap();
        let err = delete_path(&WorkerConfig::default(), &temp.path().join("gone")).unwrap_err();
        assert!(matches!(err, WorkerError::NotFound { .. }));
    }
}
