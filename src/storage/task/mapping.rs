use anyhow::Result;

use crate::storage::task::entity::Model as TaskModel;
use crate::schedule::types::{Task, TaskStatus};

impl TryFrom<TaskModel> for Task {
    type Error = anyhow::Error;

    fn try_from(model: TaskModel) -> Result<Self> {
        Ok(Task {
            id: model.id,
            status: TaskStatus::try_from(model.status).map_err(anyhow::Error::msg)?,
            config: serde_json::from_str(&model.config)?,
            data: model.data.map(|d| serde_json::from_str(&d)).transpose()?,
            created_at: model.created_at,
            updated_at: model.updated_at,
            started_at: model.started_at,
            completed_at: model.completed_at,
            result: model.result.map(|r| serde_json::from_str(&r)).transpose()?,
            error: model.error.map(|e| serde_json::from_str(&e)).transpose()?,
        })
    }
}

impl TryFrom<Task> for TaskModel {
    type Error = anyhow::Error;

    fn try_from(task: Task) -> Result<Self> {
        Ok(TaskModel {
            id: task.id,
            task_type: task.config.task_type.to_string(),
            status: task.status.to_string(),
            config: serde_json::to_string(&task.config)?,
            data: task.data.map(|d| serde_json::to_string(&d)).transpose()?,
            created_at: task.created_at,
            updated_at: task.updated_at,
            started_at: task.started_at,
            completed_at: task.completed_at,
            result: task.result.map(|r| serde_json::to_string(&r)).transpose()?,
            error: task.error.map(|e| serde_json::to_string(&e)).transpose()?,
            priority: task.config.priority as i32,
            timeout: task.config.timeout.map(|t| t as i64),
        })
    }
}
