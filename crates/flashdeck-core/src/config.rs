//! Orchestrator and worker configuration.

use std::path::PathBuf;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Configuration for the operation orchestrator.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct OrchestratorConfig {
    /// Capacity of the inbox carrying worker callbacks back to the owner.
    #[builder(default = "100")]
    #[serde(default = "default_channel_size")]
    pub channel_size: usize,

    /// Capacity of the notification broadcast channel.
    #[builder(default = "256")]
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,

    /// Delete the registered temp directory once a copy finishes.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub cleanup_after_copy: bool,
}

fn default_true() -> bool {
    true
}

fn default_channel_size() -> usize {
    100
}

fn default_notification_capacity() -> usize {
    256
}

impl OrchestratorConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.channel_size == Some(0) {
            return Err("Channel size must be greater than zero".to_string());
        }
        if self.notification_capacity == Some(0) {
            return Err("Notification capacity must be greater than zero".to_string());
        }
        Ok(())
    }
}

impl OrchestratorConfig {
    /// Create a new orchestrator config builder.
    pub fn builder() -> OrchestratorConfigBuilder {
        OrchestratorConfigBuilder::default()
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            channel_size: default_channel_size(),
            notification_capacity: default_notification_capacity(),
            cleanup_after_copy: true,
        }
    }
}

/// Configuration for the filesystem worker.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct WorkerConfig {
    /// Copy buffer size in bytes.
    #[builder(default = "64 * 1024")]
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Overwrite an existing destination.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub overwrite: bool,

    /// Move deleted paths to the OS trash instead of removing them.
    #[builder(default = "false")]
    #[serde(default)]
    pub use_trash: bool,

    /// Directory that receives tar archives unpacked from zip packages.
    #[builder(default = "default_scratch_dir()")]
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
}

fn default_buffer_size() -> usize {
    64 * 1024
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("flashdeck")
}

impl WorkerConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.buffer_size == Some(0) {
            return Err("Buffer size must be greater than zero".to_string());
        }
        if let Some(ref dir) = self.scratch_dir {
            if dir.as_os_str().is_empty() {
                return Err("Scratch directory cannot be empty".to_string());
            }
        }
        Ok(())
    }
}

impl WorkerConfig {
    /// Create a new worker config builder.
    pub fn builder() -> WorkerConfigBuilder {
        WorkerConfigBuilder::default()
    }

    /// The I/O buffer length to use, never less than one byte.
    ///
    /// Deserialized or hand-built configs skip builder validation.
    pub fn io_buffer_len(&self) -> usize {
        self.buffer_size.max(1)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            overwrite: true,
            use_trash: false,
            scratch_dir: default_scratch_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orchestrator_config_builder() {
        let config = OrchestratorConfig::builder()
            .channel_size(8usize)
            .cleanup_after_copy(false)
            .build()
            .unwrap();

        assert_eq!(config.channel_size, 8);
        assert_eq!(config.notification_capacity, 256);
        assert!(!config.cleanup_after_copy);
    }

    #[test]
    fn test_orchestrator_config_rejects_zero_capacity() {
        assert!(OrchestratorConfig::builder().channel_size(0usize).build().is_err());
        assert!(
            OrchestratorConfig::builder()
                .notification_capacity(0usize)
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_orchestrator_config_deserialize_defaults() {
        let config: OrchestratorConfig = serde_json::from_str(r#"{"channel_size": 4}"#).unwrap();
        assert_eq!(config.channel_size, 4);
        assert_eq!(config.notification_capacity, 256);
        assert!(config.cleanup_after_copy);
    }

    #[test]
    fn test_worker_config_builder() {
        let config = WorkerConfig::builder()
            .buffer_size(4096usize)
            .use_trash(true)
            .scratch_dir("/var/tmp/images")
            .build()
            .unwrap();

        assert_eq!(config.buffer_size, 4096);
        assert!(config.use_trash);
        assert!(config.overwrite);
        assert_eq!(config.scratch_dir, PathBuf::from("/var/tmp/images"));
    }

    #[test]
    fn test_worker_config_validation() {
        assert!(WorkerConfig::builder().buffer_size(0usize).build().is_err());
        assert!(WorkerConfig::builder().scratch_dir("").build().is_err());
    }

    #[test]
    fn test_worker_config_default_scratch_dir() {
        let config = WorkerConfig::default();
        assert!(config.scratch_dir.ends_with("flashdeck"));
        assert_eq!(config.buffer_size, 64 * 1024);
    }

    #[test]
    fn test_worker_config_zero_buffer_is_clamped() {
        let config: WorkerConfig = serde_json::from_str(r#"{"buffer_size": 0}"#).unwrap();
        assert_eq!(config.buffer_size, 0);
        assert_eq!(config.io_buffer_len(), 1);
        assert_eq!(WorkerConfig::default().io_buffer_len(), 64 * 1024);
    }
}
