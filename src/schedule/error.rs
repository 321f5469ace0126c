use thiserror::Error;

use crate::schedule::types::TaskError;

/// Failure of a task body, classified for the status store.
#[derive(Debug, Error)]
pub enum TrainError {
    /// Bad input or a precondition the caller can fix (400)
    #[error("{0}")]
    Validation(String),

    /// The job was removed before irreversible work started
    #[error("Task {0} has been removed")]
    Removed(String),

    /// Everything else (500), details only go to the log
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl TrainError {
    pub fn internal(message: impl Into<String>) -> Self {
        TrainError::Internal(anyhow::anyhow!(message.into()))
    }

    /// `None` for removed tasks, which keep their status.
    pub fn to_task_error(&self) -> Option<TaskError> {
        match self {
            TrainError::Validation(message) => Some(TaskError {
                code: "400".to_string(),
                message: message.clone(),
            }),
            TrainError::Removed(_) => None,
            TrainError::Internal(_) => Some(TaskError {
                code: "500".to_string(),
                message: "Internal Server Error".to_string(),
            }),
        }
    }
}

impl From<serde_json::Error> for TrainError {
    fn from(e: serde_json::Error) -> Self {
        TrainError::Validation(e.to_string())
    }
}
