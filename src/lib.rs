//! flashdeck - single-flight orchestration of long-running copy, delete and
//! disk-image operations.
//!
//! The work is split across three crates:
//!
//! - [`flashdeck_core`]: state, requests, outcomes, notifications, config
//! - [`flashdeck_storage`]: available space, file sizes, temp-dir cleanup
//! - [`flashdeck_ops`]: the worker contract, the filesystem worker and the
//!   [`Orchestrator`]
//!
//! ```no_run
//! # async fn demo() -> Result<(), flashdeck::StartError> {
//! let mut orchestrator = flashdeck::filesystem_orchestrator(
//!     flashdeck::OrchestratorConfig::default(),
//!     flashdeck::WorkerConfig::default(),
//! );
//! let mut notifications = orchestrator.subscribe();
//!
//! orchestrator.start_copy("/images/AP.tar.md5", "/mnt/usb/AP.tar.md5", None)?;
//! orchestrator.run_until_idle().await;
//!
//! while let Ok(notification) = notifications.try_recv() {
//!     println!("{notification:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub use flashdeck_core;
pub use flashdeck_ops;
pub use flashdeck_storage;

pub use flashdeck_core::{
    Notification, OperationId, OperationKind, OperationRequest, OperationState,
    OrchestratorConfig, StartError, WorkerConfig,
};
pub use flashdeck_ops::{FsWorker, Orchestrator, Worker};

/// Build an orchestrator backed by the local filesystem.
pub fn filesystem_orchestrator(
    orchestrator: OrchestratorConfig,
    worker: WorkerConfig,
) -> Orchestrator<FsWorker> {
    Orchestrator::with_config(FsWorker::with_config(worker), orchestrator)
}
