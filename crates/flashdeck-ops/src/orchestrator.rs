//! The operation orchestrator.
//!
//! Start requests are accepted or rejected synchronously. Accepted requests
//! run on blocking worker threads; their progress and terminal results come
//! back through a bounded inbox and are applied to the state only when the
//! owner calls [`Orchestrator::dispatch_next`], [`Orchestrator::dispatch_pending`]
//! or [`Orchestrator::run_until_idle`].

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flashdeck_core::{
    CopyProgress, FailedOutcome, ImageInfo, ImageReport, Notification, OperationId,
    OperationKind, OperationRequest, OperationState, OrchestratorConfig, StartError, TaskOutcome,
    ValidationOutcome,
};
use flashdeck_storage::{cleanup_temp_dir, file_size, StorageQuery};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::dispatch::Dispatch;
use crate::{ProgressSink, TaskEvent, Worker};

const STATUS_STARTING_DELETE: &str = "Starting delete...";
const STATUS_STARTING_VALIDATION: &str = "Starting image validation...";
const STATUS_EXTRACTING_INFO: &str = "Extracting image info...";
const STATUS_PROCESSING_IMAGE: &str = "Processing image info and validation...";
const STATUS_INFO_EXTRACTED: &str = "Image info extracted successfully";
const STATUS_INFO_FAILED: &str = "Failed to extract image info";
const STATUS_IMAGE_PROCESSED: &str = "Image processing completed successfully";
const STATUS_IMAGE_FAILED: &str = "Failed to process image";

const LABEL_STARTING_VALIDATION: &str = "Starting validation";
const LABEL_STARTING_PROCESSING: &str = "Starting processing";

/// Owns the operation state and runs operations on a [`Worker`].
///
/// Methods that spawn work must be called from within a Tokio runtime.
/// Dropping the orchestrator aborts the tasks that relay worker results;
/// workers already running finish on their blocking threads and their
/// results are discarded.
pub struct Orchestrator<W: Worker> {
    worker: Arc<W>,
    config: OrchestratorConfig,
    state: OperationState,
    storage: StorageQuery,
    inbox_tx: mpsc::Sender<Dispatch>,
    inbox: mpsc::Receiver<Dispatch>,
    notifier: broadcast::Sender<Notification>,
    in_flight: HashMap<OperationId, OperationRequest>,
    tasks: JoinSet<()>,
    next_id: u64,
}

impl<W: Worker> Orchestrator<W> {
    /// Create an orchestrator with default settings.
    pub fn new(worker: W) -> Self {
        Self::with_config(worker, OrchestratorConfig::default())
    }

    /// Create an orchestrator with the given configuration.
    pub fn with_config(worker: W, config: OrchestratorConfig) -> Self {
        let (inbox_tx, inbox) = mpsc::channel(config.channel_size.max(1));
        let (notifier, _) = broadcast::channel(config.notification_capacity.max(1));

        Self {
            worker: Arc::new(worker),
            config,
            state: OperationState::new(),
            storage: StorageQuery::new(),
            inbox_tx,
            inbox,
            notifier,
            in_flight: HashMap::new(),
            tasks: JoinSet::new(),
            next_id: 0,
        }
    }

    /// Replace the storage query used for available-space lookups.
    pub fn with_storage(mut self, storage: StorageQuery) -> Self {
        self.storage = storage;
        self
    }

    /// Subscribe to notifications published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifier.subscribe()
    }

    /// The current operation state.
    pub fn state(&self) -> &OperationState {
        &self.state
    }

    pub fn is_copying(&self) -> bool {
        self.state.is_copying
    }

    pub fn status(&self) -> &str {
        &self.state.status
    }

    pub fn total_size(&self) -> u64 {
        self.state.total_size
    }

    /// Copy progress as a truncated percentage, 0 when the total is unknown.
    pub fn progress_percent(&self) -> u32 {
        self.state.progress_percent()
    }

    /// Number of accepted operations whose result has not been applied yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// Size in bytes of the regular file at `path`, or -1.
    pub fn get_file_size(&self, path: impl AsRef<Path>) -> i64 {
        file_size(path.as_ref())
            .and_then(|size| i64::try_from(size).ok())
            .unwrap_or(-1)
    }

    /// Bytes available on the volume containing `path`, or 0 if unknown.
    pub fn get_available_space(&self, path: impl AsRef<Path>) -> u64 {
        self.storage.available_space(path.as_ref())
    }

    /// Start any operation described by `request`.
    pub fn start(&mut self, request: OperationRequest) -> Result<OperationId, StartError> {
        match request {
            OperationRequest::Copy {
                source,
                destination,
                cleanup_dir,
            } => self.begin_copy(source, destination, cleanup_dir),
            OperationRequest::Delete { path } => Ok(self.begin_delete(path)),
            OperationRequest::Validate { path } => Ok(self.begin_validation(path)),
            OperationRequest::ExtractInfo { path } => self.begin_info_extraction(path),
            OperationRequest::ExtractAndValidate { path } => self.begin_info_and_validation(path),
        }
    }

    /// Copy `source` to `destination`, removing `cleanup_dir` afterwards.
    ///
    /// Only one copy runs at a time. A rejected copy leaves the state as is.
    pub fn start_copy(
        &mut self,
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        cleanup_dir: Option<PathBuf>,
    ) -> Result<OperationId, StartError> {
        self.start(OperationRequest::copy(source, destination, cleanup_dir))
    }

    /// Delete the file or directory at `path`.
    pub fn start_delete(&mut self, path: impl Into<PathBuf>) -> Result<OperationId, StartError> {
        self.start(OperationRequest::delete(path))
    }

    /// Validate the disk image at `path`.
    pub fn start_image_validation(
        &mut self,
        path: impl Into<PathBuf>,
    ) -> Result<OperationId, StartError> {
        self.start(OperationRequest::validate(path))
    }

    /// Read the name and Android version of the disk image at `path`.
    ///
    /// Rejected while a copy is running.
    pub fn start_image_info_extraction(
        &mut self,
        path: impl Into<PathBuf>,
    ) -> Result<OperationId, StartError> {
        self.start(OperationRequest::extract_info(path))
    }

    /// Read image info, then validate the disk image at `path`.
    ///
    /// Rejected while a copy is running.
    pub fn start_image_info_and_validation(
        &mut self,
        path: impl Into<PathBuf>,
    ) -> Result<OperationId, StartError> {
        self.start(OperationRequest::extract_and_validate(path))
    }

    /// Wait for the next worker message and apply it.
    ///
    /// Returns the id of the operation it completed, if any. Returns `None`
    /// at once when nothing is in flight.
    pub async fn dispatch_next(&mut self) -> Option<OperationId> {
        if self.in_flight.is_empty() {
            return None;
        }
        let dispatch = self.inbox.recv().await?;
        self.apply(dispatch)
    }

    /// Apply every worker message already queued. Returns how many were applied.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(dispatch) = self.inbox.try_recv() {
            self.apply(dispatch);
            applied += 1;
        }
        applied
    }

    /// Apply worker messages until every accepted operation has finished.
    pub async fn run_until_idle(&mut self) {
        while !self.in_flight.is_empty() {
            self.dispatch_next().await;
        }
    }

    fn begin_copy(
        &mut self,
        source: PathBuf,
        destination: PathBuf,
        cleanup_dir: Option<PathBuf>,
    ) -> Result<OperationId, StartError> {
        if self.state.is_copying {
            return Err(self.reject(OperationKind::Copy, StartError::AlreadyCopying));
        }
        self.ensure_destination_parent(&destination)?;

        self.state.begin_copy(cleanup_dir.clone());
        self.publish(Notification::IsCopyingChanged(true));
        self.publish(Notification::StatusChanged(self.state.status.clone()));
        self.publish(Notification::ProgressChanged(0));
        self.publish(Notification::TotalSizeChanged(0));

        let id = self.register(OperationRequest::Copy {
            source: source.clone(),
            destination: destination.clone(),
            cleanup_dir,
        });
        self.spawn_task(id, Dispatch::Copy, move |worker, progress| {
            worker.copy(&source, &destination, progress)
        });
        Ok(id)
    }

    fn begin_delete(&mut self, path: PathBuf) -> OperationId {
        self.state.deleting_path = Some(path.clone());
        self.set_status(STATUS_STARTING_DELETE);

        let id = self.register(OperationRequest::Delete { path: path.clone() });
        self.spawn_task(id, Dispatch::Delete, move |worker, _| worker.delete(&path));
        id
    }

    fn begin_validation(&mut self, path: PathBuf) -> OperationId {
        self.set_status(STATUS_STARTING_VALIDATION);
        self.publish(Notification::ValidationProgress {
            label: LABEL_STARTING_VALIDATION.to_string(),
            percent: 0,
        });

        let id = self.register(OperationRequest::Validate { path: path.clone() });
        self.spawn_task(id, Dispatch::Validate, move |worker, progress| {
            worker.validate_image(&path, progress)
        });
        id
    }

    fn begin_info_extraction(&mut self, path: PathBuf) -> Result<OperationId, StartError> {
        if self.state.is_copying {
            return Err(self.reject(OperationKind::ExtractInfo, StartError::AlreadyProcessing));
        }
        self.set_status(STATUS_EXTRACTING_INFO);

        let id = self.register(OperationRequest::ExtractInfo { path: path.clone() });
        self.spawn_task(id, Dispatch::ExtractInfo, move |worker, _| {
            worker.extract_image_info(&path)
        });
        Ok(id)
    }

    fn begin_info_and_validation(&mut self, path: PathBuf) -> Result<OperationId, StartError> {
        if self.state.is_copying {
            return Err(self.reject(
                OperationKind::ExtractAndValidate,
                StartError::AlreadyProcessing,
            ));
        }
        self.set_status(STATUS_PROCESSING_IMAGE);
        self.publish(Notification::ValidationProgress {
            label: LABEL_STARTING_PROCESSING.to_string(),
            percent: 0,
        });

        let id = self.register(OperationRequest::ExtractAndValidate { path: path.clone() });
        self.spawn_task(id, Dispatch::ExtractAndValidate, move |worker, progress| {
            worker.extract_and_validate(&path, progress)
        });
        Ok(id)
    }

    fn ensure_destination_parent(&mut self, destination: &Path) -> Result<(), StartError> {
        let Some(parent) = destination
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
        else {
            return Ok(());
        };
        if parent.is_dir() {
            return Ok(());
        }

        match fs::create_dir_all(parent) {
            Ok(()) => {
                debug!(path = %parent.display(), "Created destination directory");
                Ok(())
            }
            Err(source) => {
                let error = StartError::CreateDestination {
                    path: parent.to_path_buf(),
                    source,
                };
                warn!(path = %parent.display(), %error, "Copy not started");
                self.set_status(error.to_string());
                self.publish(Notification::CopyFailed {
                    message: error.to_string(),
                });
                Err(error)
            }
        }
    }

    fn reject(&self, kind: OperationKind, error: StartError) -> StartError {
        debug!(%kind, reason = %error, "Start rejected");
        self.publish(Notification::StartRejected {
            kind,
            reason: error.to_string(),
        });
        error
    }

    fn register(&mut self, request: OperationRequest) -> OperationId {
        self.next_id += 1;
        let id = OperationId(self.next_id);
        info!(%id, kind = %request.kind(), path = %request.target().display(), "Operation started");
        self.in_flight.insert(id, request);
        id
    }

    /// Run `job` on a blocking thread and relay its events to the inbox.
    ///
    /// A worker that panics still yields a failed terminal result.
    fn spawn_task<P, R, G, F>(&mut self, id: OperationId, route: G, job: F)
    where
        P: Send + 'static,
        R: FailedOutcome + Send + 'static,
        G: Fn(OperationId, TaskEvent<P, R>) -> Dispatch + Copy + Send + Sync + 'static,
        F: FnOnce(&W, &ProgressSink<P>) -> R + Send + 'static,
    {
        let worker = Arc::clone(&self.worker);
        let inbox = self.inbox_tx.clone();

        self.tasks.spawn(async move {
            let progress = {
                let inbox = inbox.clone();
                ProgressSink::new(move |update| {
                    let _ = inbox.blocking_send(route(id, TaskEvent::Progress(update)));
                })
            };

            let outcome = tokio::task::spawn_blocking(move || job(&*worker, &progress))
                .await
                .unwrap_or_else(|e| {
                    warn!(%id, error = %e, "Worker task failed");
                    R::failed(format!("Worker task failed: {e}"))
                });

            let _ = inbox.send(route(id, TaskEvent::Finished(outcome))).await;
        });
    }

    /// Apply one worker message. Returns the id if it completed an operation.
    fn apply(&mut self, dispatch: Dispatch) -> Option<OperationId> {
        let id = dispatch.id();
        match dispatch {
            Dispatch::Copy(_, TaskEvent::Progress(progress)) => {
                self.on_copy_progress(progress);
                return None;
            }
            Dispatch::Validate(_, TaskEvent::Progress(progress))
            | Dispatch::ExtractAndValidate(_, TaskEvent::Progress(progress)) => {
                self.publish(Notification::ValidationProgress {
                    label: progress.label,
                    percent: progress.percent,
                });
                return None;
            }
            Dispatch::Delete(_, TaskEvent::Progress(never))
            | Dispatch::ExtractInfo(_, TaskEvent::Progress(never)) => match never {},

            Dispatch::Copy(_, TaskEvent::Finished(outcome)) => self.on_copy_finished(id, outcome),
            Dispatch::Delete(_, TaskEvent::Finished(outcome)) => {
                self.on_delete_finished(id, outcome)
            }
            Dispatch::Validate(_, TaskEvent::Finished(outcome)) => {
                self.on_validation_finished(id, outcome)
            }
            Dispatch::ExtractInfo(_, TaskEvent::Finished(info)) => {
                self.on_info_extracted(id, info)
            }
            Dispatch::ExtractAndValidate(_, TaskEvent::Finished(report)) => {
                self.on_image_processed(id, report)
            }
        }

        self.in_flight.remove(&id);
        while self.tasks.try_join_next().is_some() {}
        Some(id)
    }

    fn on_copy_progress(&mut self, progress: CopyProgress) {
        if self.state.apply_progress(progress) {
            self.publish(Notification::TotalSizeChanged(self.state.total_size));
        }
        self.publish(Notification::ProgressChanged(self.state.progress_percent()));
    }

    fn on_copy_finished(&mut self, id: OperationId, outcome: TaskOutcome) {
        self.state.is_copying = false;
        self.state.status = outcome.message.clone();
        self.publish(Notification::IsCopyingChanged(false));
        self.publish(Notification::StatusChanged(outcome.message.clone()));

        if let Some(dir) = self.state.pending_cleanup_dir.take() {
            if self.config.cleanup_after_copy {
                let report = cleanup_temp_dir(&dir);
                if !report.is_clean() {
                    warn!(%id, path = %dir.display(), failures = report.failures.len(), "Cleanup incomplete");
                }
            } else {
                debug!(%id, path = %dir.display(), "Cleanup disabled, keeping directory");
            }
        }

        if outcome.success {
            info!(%id, "Copy finished");
            self.publish(Notification::CopySucceeded);
        } else {
            warn!(%id, message = %outcome.message, "Copy failed");
            self.publish(Notification::CopyFailed {
                message: outcome.message,
            });
        }
    }

    fn on_delete_finished(&mut self, id: OperationId, outcome: TaskOutcome) {
        self.set_status(outcome.message.clone());

        if outcome.success {
            let path = self
                .in_flight
                .get(&id)
                .map(|request| request.target().to_path_buf())
                .unwrap_or_default();
            info!(%id, path = %path.display(), "Delete finished");
            self.publish(Notification::DeleteSucceeded { path });
        } else {
            warn!(%id, message = %outcome.message, "Delete failed");
            self.publish(Notification::DeleteFailed {
                message: outcome.message,
            });
        }
    }

    fn on_validation_finished(&mut self, id: OperationId, outcome: ValidationOutcome) {
        self.set_status(outcome.message.clone());

        if outcome.success {
            info!(%id, image = %outcome.image_name, "Image validated");
            self.publish(Notification::ValidationSucceeded {
                image_name: outcome.image_name,
                archive_path: outcome.archive_path,
            });
        } else {
            warn!(%id, message = %outcome.message, "Image validation failed");
            self.publish(Notification::ValidationFailed {
                message: outcome.message,
            });
        }
    }

    fn on_info_extracted(&mut self, id: OperationId, info: ImageInfo) {
        if info.success {
            info!(%id, image = %info.image_name, version = %info.android_version, "Image info extracted");
            self.set_status(STATUS_INFO_EXTRACTED);
        } else {
            warn!(%id, error = %info.error_message, "Image info extraction failed");
            self.set_status(STATUS_INFO_FAILED);
        }

        self.publish(Notification::ImageInfoExtracted {
            success: info.success,
            image_name: info.image_name,
            android_version: info.android_version,
            error_message: info.error_message,
        });
    }

    fn on_image_processed(&mut self, id: OperationId, report: ImageReport) {
        if report.success {
            info!(%id, image = %report.image_name, "Image processed");
            self.set_status(STATUS_IMAGE_PROCESSED);
        } else {
            warn!(%id, message = %report.message, "Image processing failed");
            self.set_status(STATUS_IMAGE_FAILED);
        }

        self.publish(Notification::ImageInfoAndValidationCompleted {
            success: report.success,
            message: report.message,
            image_name: report.image_name,
            android_version: report.android_version,
            archive_path: report.archive_path,
        });
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.state.status = status.into();
        self.publish(Notification::StatusChanged(self.state.status.clone()));
    }

    fn publish(&self, notification: Notification) {
        // No subscribers is fine.
        let _ = self.notifier.send(notification);
    }
}

impl<W: Worker> std::fmt::Debug for Orchestrator<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FsWorker;
    use tempfile::TempDir;

    fn drain(rx: &mut broadcast::Receiver<Notification>) -> Vec<Notification> {
        let mut seen = Vec::new();
        while let Ok(notification) = rx.try_recv() {
            seen.push(notification);
        }
        seen
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_copy_publishes_start_events_in_order() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("image.bin");
        fs::write(&source, vec![1u8; 4096]).unwrap();

        let mut orchestrator = Orchestrator::new(FsWorker::new());
        let mut rx = orchestrator.subscribe();

        orchestrator
            .start_copy(&source, temp.path().join("out.bin"), None)
            .unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![
                Notification::IsCopyingChanged(true),
                Notification::StatusChanged("Starting copy...".into()),
                Notification::ProgressChanged(0),
                Notification::TotalSizeChanged(0),
            ]
        );

        orchestrator.run_until_idle().await;
        assert!(!orchestrator.is_copying());
        assert_eq!(orchestrator.status(), "Copy completed.");
        assert!(drain(&mut rx).contains(&Notification::CopySucceeded));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_nothing_applied_until_dispatch() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("victim.txt");
        fs::write(&path, b"x").unwrap();

        let mut orchestrator = Orchestrator::new(FsWorker::new());
        orchestrator.start_delete(&path).unwrap();
        assert_eq!(orchestrator.in_flight(), 1);
        assert_eq!(orchestrator.status(), "Starting delete...");

        orchestrator.run_until_idle().await;
        assert!(orchestrator.is_idle());
        assert_eq!(orchestrator.status(), "Delete completed.");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_file_size_sentinel() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("five.bin");
        fs::write(&path, b"12345").unwrap();

        let orchestrator = Orchestrator::new(FsWorker::new());
        assert_eq!(orchestrator.get_file_size(&path), 5);
        assert_eq!(orchestrator.get_file_size(temp.path()), -1);
        assert_eq!(orchestrator.get_file_size(temp.path().join("nope")), -1);
    }
}
