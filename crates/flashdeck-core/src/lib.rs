//! Core types and configuration for flashdeck.
//!
//! This crate provides the data shared by the storage service and the
//! operation orchestrator: the long-lived operation state, requests and
//! their terminal outcomes, the public notification surface, and the
//! configuration for both the orchestrator and the filesystem worker.

mod config;
mod error;
mod notification;
mod outcome;
mod request;
mod state;

pub use config::{OrchestratorConfig, OrchestratorConfigBuilder, WorkerConfig, WorkerConfigBuilder};
pub use error::{StartError, WorkerError};
pub use notification::Notification;
pub use outcome::{
    CopyProgress, FailedOutcome, ImageInfo, ImageReport, StageProgress, TaskOutcome,
    ValidationOutcome,
};
pub use request::{OperationId, OperationKind, OperationRequest};
pub use state::OperationState;

/// Android version reported when an image carries no readable build properties.
pub const UNKNOWN_VERSION: &str = "Unknown";
