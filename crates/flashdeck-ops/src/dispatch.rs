//! Messages carried from worker tasks back to the owning context.

use std::convert::Infallible;

use flashdeck_core::{
    CopyProgress, ImageInfo, ImageReport, OperationId, StageProgress, TaskOutcome,
    ValidationOutcome,
};

use crate::TaskEvent;

/// One task event, tagged with the operation it belongs to.
///
/// Tasks without progress use [`Infallible`] so a progress event for them
/// cannot be constructed.
#[derive(Debug)]
pub(crate) enum Dispatch {
    Copy(OperationId, TaskEvent<CopyProgress, TaskOutcome>),
    Delete(OperationId, TaskEvent<Infallible, TaskOutcome>),
    Validate(OperationId, TaskEvent<StageProgress, ValidationOutcome>),
    ExtractInfo(OperationId, TaskEvent<Infallible, ImageInfo>),
    ExtractAndValidate(OperationId, TaskEvent<StageProgress, ImageReport>),
}

impl Dispatch {
    /// The operation this message belongs to.
    pub(crate) fn id(&self) -> OperationId {
        match self {
            Self::Copy(id, _)
            | Self::Delete(id, _)
            | Self::Validate(id, _)
            | Self::ExtractInfo(id, _)
            | Self::ExtractAndValidate(id, _) => *id,
        }
    }
}
