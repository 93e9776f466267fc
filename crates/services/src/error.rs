//! Shared error types for the services crate.

use thiserror::Error;

use course_core::model::{DocumentError, StageId, StageValidationError};
use storage::StorageError;

/// Errors emitted by `StageEditor`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EditorError {
    #[error("a draft is already open; commit or cancel it first")]
    DraftInProgress,
    #[error("no draft is open")]
    NoDraft,
    #[error("stage {0} does not exist")]
    UnknownStage(StageId),
    #[error("the open draft is not a {0} draft")]
    WrongDraftKind(&'static str),
    #[error(transparent)]
    Validation(#[from] StageValidationError),
}

/// Errors emitted by `CourseSession`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CourseSessionError {
    #[error(transparent)]
    Editor(#[from] EditorError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
