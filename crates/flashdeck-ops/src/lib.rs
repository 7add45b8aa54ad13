//! Operation orchestration for flashdeck.
//!
//! This crate runs copy, delete and disk-image tasks on background threads
//! and folds their progress and results back into a single owned
//! [`Orchestrator`], which enforces single-flight copies, tracks progress,
//! cleans up temp directories and publishes [`Notification`]s.
//!
//! [`Notification`]: flashdeck_core::Notification

mod copy;
mod delete;
mod dispatch;
mod fs_worker;
mod image;
mod orchestrator;
mod worker;

pub use fs_worker::FsWorker;
pub use image::{image_name, ArchiveFormat};
pub use orchestrator::Orchestrator;
pub use worker::{ProgressSink, TaskEvent, Worker};
