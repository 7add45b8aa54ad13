//! Volume discovery and root path resolution.

use std::path::{Path, PathBuf};

use serde::Serialize;
use sysinfo::Disks;

/// A mounted volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Volume {
    /// Where the volume is mounted (`/`, `/mnt/usb`, `C:\`).
    pub mount_point: PathBuf,
    /// Capacity in bytes.
    pub total_space: u64,
    /// Bytes available to the current user.
    pub available_space: u64,
}

impl Volume {
    pub fn new(mount_point: impl Into<PathBuf>, total_space: u64, available_space: u64) -> Self {
        Self {
            mount_point: mount_point.into(),
            total_space,
            available_space,
        }
    }
}

/// Source of the currently mounted volumes.
pub trait VolumeSource: Send + Sync {
    /// List the mounted volumes. Called on every query, never cached.
    fn volumes(&self) -> Vec<Volume>;
}

/// Volumes reported by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemVolumes;

impl VolumeSource for SystemVolumes {
    fn volumes(&self) -> Vec<Volume> {
        let disks = Disks::new_with_refreshed_list();
        disks
            .list()
            .iter()
            .map(|disk| Volume {
                mount_point: disk.mount_point().to_path_buf(),
                total_space: disk.total_space(),
                available_space: disk.available_space(),
            })
            .collect()
    }
}

/// Strategy for resolving a path to the root of its containing volume.
pub trait RootStrategy: Send + Sync {
    fn resolve(&self, path: &Path, volumes: &[Volume]) -> PathBuf;
}

/// Drive-letter resolution (`D:\images\a.tar` resolves to `D:/`).
#[derive(Debug, Clone, Copy, Default)]
pub struct DriveLetterRoot;

impl RootStrategy for DriveLetterRoot {
    fn resolve(&self, path: &Path, _volumes: &[Volume]) -> PathBuf {
        if let Some(root) = drive_root(&forward_slashes(path)) {
            return root;
        }

        // Relative paths pick up the drive of the working directory
        if let Some(root) = std::path::absolute(path)
            .ok()
            .and_then(|absolute| drive_root(&forward_slashes(&absolute)))
        {
            return root;
        }

        std::env::var("SystemDrive")
            .map(|drive| PathBuf::from(format!("{drive}/")))
            .unwrap_or_else(|_| PathBuf::from("/"))
    }
}

/// Mount point resolution: the deepest mount point containing the path.
#[derive(Debug, Clone, Copy, Default)]
pub struct MountPointRoot;

impl RootStrategy for MountPointRoot {
    fn resolve(&self, path: &Path, volumes: &[Volume]) -> PathBuf {
        if path.as_os_str().is_empty() {
            return PathBuf::from("/");
        }

        let absolute = std::fs::canonicalize(path)
            .or_else(|_| std::path::absolute(path))
            .unwrap_or_else(|_| path.to_path_buf());

        volumes
            .iter()
            .map(|volume| &volume.mount_point)
            .filter(|mount_point| absolute.starts_with(mount_point))
            .max_by_key(|mount_point| mount_point.components().count())
            .cloned()
            .unwrap_or_else(|| PathBuf::from("/"))
    }
}

/// The root strategy for the build target.
#[cfg(windows)]
pub type PlatformRoot = DriveLetterRoot;

/// The root strategy for the build target.
#[cfg(not(windows))]
pub type PlatformRoot = MountPointRoot;

/// Whether two roots name the same volume, ignoring separator style.
pub(crate) fn same_root(a: &Path, b: &Path) -> bool {
    root_key(a) == root_key(b)
}

fn root_key(path: &Path) -> String {
    let mut key = forward_slashes(path);
    if !key.ends_with('/') {
        key.push('/');
    }
    if drive_root(&key).is_some() {
        key.make_ascii_uppercase();
    }
    key
}

fn forward_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn drive_root(path: &str) -> Option<PathBuf> {
    let mut chars = path.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), Some(':')) if letter.is_ascii_alphabetic() => {
            Some(PathBuf::from(format!("{letter}:/")))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volumes() -> Vec<Volume> {
        vec![
            Volume::new("/", 100, 50),
            Volume::new("/mnt/usb", 64, 32),
            Volume::new("/mnt/usb/nested", 16, 8),
        ]
    }

    #[test]
    fn test_drive_letter_from_path() {
        let strategy = DriveLetterRoot;
        assert_eq!(
            strategy.resolve(Path::new("D:\\images\\a.tar"), &[]),
            PathBuf::from("D:/")
        );
        assert_eq!(
            strategy.resolve(Path::new("e:/firmware"), &[]),
            PathBuf::from("e:/")
        );
    }

    #[test]
    fn test_drive_letter_requires_letter() {
        assert!(drive_root("1:/x").is_none());
        assert!(drive_root("/x").is_none());
        assert!(drive_root("C").is_none());
    }

    #[cfg(not(windows))]
    #[test]
    fn test_drive_letter_falls_back_without_drive() {
        let root = DriveLetterRoot.resolve(Path::new("relative/file"), &[]);
        assert!(!root.as_os_str().is_empty());
    }

    #[test]
    fn test_mount_point_empty_path_is_root() {
        assert_eq!(MountPointRoot.resolve(Path::new(""), &volumes()), PathBuf::from("/"));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_mount_point_picks_deepest_mount() {
        let strategy = MountPointRoot;
        let volumes = volumes();

        assert_eq!(
            strategy.resolve(Path::new("/mnt/usb/images/a.tar"), &volumes),
            PathBuf::from("/mnt/usb")
        );
        assert_eq!(
            strategy.resolve(Path::new("/mnt/usb/nested/a.tar"), &volumes),
            PathBuf::from("/mnt/usb/nested")
        );
        assert_eq!(
            strategy.resolve(Path::new("/mnt/usb"), &volumes),
            PathBuf::from("/mnt/usb")
        );
        // Component-wise prefix, not string prefix
        assert_eq!(
            strategy.resolve(Path::new("/mnt/usb2/file"), &volumes),
            PathBuf::from("/")
        );
    }

    #[test]
    fn test_same_root_ignores_separators() {
        assert!(same_root(Path::new("C:\\"), Path::new("c:/")));
        assert!(same_root(Path::new("/mnt/usb"), Path::new("/mnt/usb/")));
        assert!(!same_root(Path::new("/mnt/usb"), Path::new("/")));
    }
}
