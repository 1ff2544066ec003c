use thiserror::Error;

use crate::domain::{ParseIdError, TaskId, TaskKind, UnknownStatus, UnknownTaskKind};

/// Rejections returned synchronously by `submit`; the task is never created.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    UnknownTaskKind(#[from] UnknownTaskKind),

    #[error("no handler registered for task_type={0}")]
    HandlerNotFound(TaskKind),

    #[error("invalid payload for task_type={kind}: {source}")]
    InvalidPayload {
        kind: TaskKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("engine is shutting down")]
    ShuttingDown,
}

/// Errors from status and listing queries.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("task {0} not found")]
    NotFound(String),

    #[error(transparent)]
    InvalidStatus(#[from] UnknownStatus),
}

impl From<ParseIdError> for StatusError {
    fn from(err: ParseIdError) -> Self {
        StatusError::NotFound(err.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("task {0} not found")]
    NotFound(TaskId),
}

impl From<RecordError> for StatusError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::NotFound(id) => StatusError::NotFound(id.to_string()),
        }
    }
}
