//! Available-space and file-size queries.

use std::fs;
use std::path::{Path, PathBuf};

use humansize::{format_size, BINARY};
use serde::Serialize;
use tracing::debug;

use crate::volume::{same_root, PlatformRoot, RootStrategy, SystemVolumes, VolumeSource};

/// The volume root resolved for a path and the bytes available on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageRoot {
    pub root: PathBuf,
    /// Available bytes; 0 means unknown or unavailable.
    pub available: u64,
}

/// Resolves paths to their volume and reports its free space.
///
/// Every query lists the volumes afresh; nothing is cached.
pub struct StorageQuery {
    strategy: Box<dyn RootStrategy>,
    source: Box<dyn VolumeSource>,
}

impl StorageQuery {
    /// Query the operating system's volumes using the platform strategy.
    pub fn new() -> Self {
        Self::with_parts(PlatformRoot::default(), SystemVolumes)
    }

    /// Query with an explicit strategy and volume source.
    pub fn with_parts(
        strategy: impl RootStrategy + 'static,
        source: impl VolumeSource + 'static,
    ) -> Self {
        Self {
            strategy: Box::new(strategy),
            source: Box::new(source),
        }
    }

    /// Resolve `path` to its volume root and read the available space.
    pub fn query(&self, path: &Path) -> StorageRoot {
        let volumes = self.source.volumes();
        let root = self.strategy.resolve(path, &volumes);

        let Some(volume) = volumes
            .iter()
            .find(|volume| same_root(&volume.mount_point, &root))
        else {
            debug!(root = %root.display(), "Storage root is not a ready volume");
            return StorageRoot { root, available: 0 };
        };

        debug!(
            root = %root.display(),
            available = %format_size(volume.available_space, BINARY),
            "Resolved storage root"
        );

        StorageRoot {
            root,
            available: volume.available_space,
        }
    }

    /// Bytes available on the volume containing `path`, 0 if unknown.
    pub fn available_space(&self, path: &Path) -> u64 {
        self.query(path).available
    }
}

impl Default for StorageQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StorageQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageQuery").finish_non_exhaustive()
    }
}

/// Size of the file at `path`, or `None` if it is not an existing file.
pub fn file_size(path: &Path) -> Option<u64> {
    fs::metadata(path)
        .ok()
        .filter(|metadata| metadata.is_file())
        .map(|metadata| metadata.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::{DriveLetterRoot, MountPointRoot, Volume};

    struct FixedVolumes(Vec<Volume>);

    impl VolumeSource for FixedVolumes {
        fn volumes(&self) -> Vec<Volume> {
            self.0.clone()
        }
    }

    #[cfg(not(windows))]
    #[test]
    fn test_query_reports_containing_volume() {
        let query = StorageQuery::with_parts(
            MountPointRoot,
            FixedVolumes(vec![
                Volume::new("/", 1000, 400),
                Volume::new("/mnt/usb", 500, 123),
            ]),
        );

        let root = query.query(Path::new("/mnt/usb/firmware/a.tar"));
        assert_eq!(root.root, PathBuf::from("/mnt/usb"));
        assert_eq!(root.available, 123);
        assert_eq!(query.available_space(Path::new("/home/user")), 400);
    }

    #[test]
    fn test_query_unknown_root_is_zero() {
        let query = StorageQuery::with_parts(
            DriveLetterRoot,
            FixedVolumes(vec![Volume::new("C:\\", 1000, 400)]),
        );

        assert_eq!(query.available_space(Path::new("Z:\\missing")), 0);
        assert_eq!(query.available_space(Path::new("c:\\Users")), 400);
    }

    #[test]
    fn test_query_without_volumes_is_zero() {
        let query = StorageQuery::with_parts(MountPointRoot, FixedVolumes(Vec::new()));
        assert_eq!(query.available_space(Path::new("")), 0);
    }
}
