use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tracing::{info, warn};

use crate::schedule::error::TrainError;
use crate::schedule::types::{TaskError, TaskResult, TaskStatus};
use crate::storage::task::TaskStorage;

/// Job-status store operations used by task bodies and the task manager.
#[derive(Clone)]
pub struct StatusReporter {
    storage: Arc<dyn TaskStorage>,
}

impl StatusReporter {
    pub fn new(storage: Arc<dyn TaskStorage>) -> Self {
        Self { storage }
    }

    pub async fn started(&self, task_id: &str, data: &Value) -> Result<()> {
        let data = serde_json::to_string(data)?;
        if self.storage.mark_started(task_id, Some(&data)).await? {
            info!("Task {} started", task_id);
        } else {
            warn!("Task {} already finished before it started", task_id);
        }
        Ok(())
    }

    pub async fn success(&self, task_id: &str, data: Option<&Value>, response: &TaskResult) -> Result<()> {
        let result = serde_json::to_string(response)?;
        let data = data.map(serde_json::to_string).transpose()?;
        if !self.storage.finish(task_id, &TaskStatus::Completed.to_string(), data.as_deref(), Some(&result), None).await? {
            warn!("Task {} already finished, success not recorded", task_id);
        }
        Ok(())
    }

    pub async fn failed(&self, task_id: &str, data: Option<&Value>, error: &TaskError) -> Result<()> {
        let error_json = serde_json::to_string(error)?;
        let data = data.map(serde_json::to_string).transpose()?;
        if !self.storage.finish(task_id, &TaskStatus::Failed.to_string(), data.as_deref(), None, Some(&error_json)).await? {
            warn!("Task {} already finished, failure not recorded", task_id);
        }
        Ok(())
    }

    /// Errors with `TrainError::Removed` once the job was cancelled, timed out or deleted.
    pub async fn check_task_removed(&self, task_id: &str) -> Result<(), TrainError> {
        let removed = match self.storage.get(task_id).await? {
            // a running job only turns terminal when someone else moved it
            Some(model) => TaskStatus::try_from(model.status)
                .map_err(TrainError::internal)?
                .is_terminal(),
            None => true,
        };

        if removed {
            return Err(TrainError::Removed(task_id.to_string()));
        }
        Ok(())
    }
}
