use std::sync::Arc;
use std::collections::HashMap;
use anyhow::Result;
use uuid::Uuid;
use chrono::Utc;
use tracing::{info, warn, error};
use serde::{Serialize, Deserialize};
use serde_json::Value;

use crate::schedule::types::{
    Task, TaskConfig, TaskParams, TaskResult, TaskStatus, TaskType, CallbackType,
};
use crate::schedule::error::TrainError;
use crate::schedule::status::StatusReporter;
use crate::storage::task::entity::Model as TaskModel;
use crate::storage::task::TaskStorage;
use crate::schedule::processors::TaskProcessor;
use crate::schedule::callback::{TaskCallback, HttpCallback, EventCallback, TaskEvent};
use crate::web::Pagination;

pub struct TaskManager {
    pub storage: Arc<dyn TaskStorage>,
    processors: HashMap<TaskType, Box<dyn TaskProcessor>>,
    status: StatusReporter,
    event_callback: EventCallback,
    client: reqwest::Client,
}

impl TaskManager {
    pub fn new(storage: Arc<dyn TaskStorage>) -> Self {
        let (event_callback, _) = EventCallback::new(64);
        Self {
            status: StatusReporter::new(storage.clone()),
            storage,
            processors: HashMap::new(),
            event_callback,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn storage(&self) -> &Arc<dyn TaskStorage> {
        &self.storage
    }

    pub fn status_reporter(&self) -> StatusReporter {
        self.status.clone()
    }

    pub fn register_processor(&mut self, processor: Box<dyn TaskProcessor>) {
        let task_type = processor.task_type();
        info!("Registering processor for task type: {:?}", task_type);
        self.processors.insert(task_type, processor);
    }

    /// Events of tasks whose callback type is `Event`.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<TaskEvent> {
        self.event_callback.subscribe()
    }

    pub async fn create_task(&self, config: TaskConfig, task_id: Option<String>) -> Result<Task> {
        // validate task params
        let processor = self.processors.get(&config.task_type)
            .ok_or_else(|| anyhow::anyhow!("No processor found for task type: {:?}", config.task_type))?;

        processor.validate_params(&config.params)?;

        let id = task_id.unwrap_or_else(|| format!("task-{}", Uuid::new_v4()));
        if self.storage.get(&id).await?.is_some() {
            return Err(anyhow::anyhow!("Task {} already exists", id));
        }

        let task = Task {
            id,
            status: TaskStatus::Pending,
            config,
            data: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        };

        self.storage.create(&TaskModel::try_from(task.clone())?).await?;
        info!("Creating new task: {}", task.id);
        Ok(task)
    }

    /// Claims the next pending task of `task_type`, moving it to `Processing`.
    pub async fn get_next_task(&self, task_type: &TaskType) -> Result<Option<Task>> {
        let model = self.storage.claim_next(&task_type.to_string()).await?;
        let task = model.map(Task::try_from).transpose()?;
        if let Some(task) = &task {
            info!("Starting task {}", task.id);
        }
        Ok(task)
    }

    /// Runs the task body and records its terminal status.
    pub async fn process_task(&self, task: &Task) -> Result<()> {
        let processor = self.processors.get(&task.config.task_type)
            .ok_or_else(|| anyhow::anyhow!("No processor found for task type"))?;

        info!("Processing task {} with processor {:?}", task.id, task.config.task_type);

        let data = Self::task_data(task);
        let mut task = task.clone();

        match processor.process(&task).await {
            Ok(result) => {
                info!("Task {} completed successfully", task.id);
                self.status.success(&task.id, data.as_ref(), &result).await?;
                task.status = TaskStatus::Completed;
                task.result = Some(result);
            }
            Err(TrainError::Removed(_)) => {
                info!("Task {} was removed or timed out, skipping", task.id);
                if let CallbackType::Event = task.config.callback_type {
                    self.event_callback.publish(TaskEvent::Removed { task_id: task.id.clone() });
                }
                return Ok(());
            }
            Err(e) => {
                error!("Failed to process task {}: {:#}", task.id, e);
                let Some(task_error) = e.to_task_error() else { return Ok(()) };
                self.status.failed(&task.id, data.as_ref(), &task_error).await?;
                task.status = TaskStatus::Failed;
                task.error = Some(task_error);
            }
        }

        task.completed_at = Some(Utc::now());
        task.updated_at = Utc::now();

        // callback failures do not change the task outcome
        if let Err(e) = self.handle_callback(&task).await {
            error!("Failed to handle callback for task {}: {}", task.id, e);
        }

        Ok(())
    }

    // job metadata as submitted, when it decodes
    fn task_data(task: &Task) -> Option<Value> {
        match &task.config.params {
            TaskParams::AiCoverTrain(params) => params.decode_data().ok(),
        }
    }

    pub async fn handle_callback(&self, task: &Task) -> Result<()> {
        // handle callback by callback type and complete status change
        let callback: Box<dyn TaskCallback> = match &task.config.callback_type {
            CallbackType::Http { url } => Box::new(HttpCallback::new(self.client.clone(), url.clone())),
            CallbackType::Event => Box::new(self.event_callback.clone()),
            CallbackType::None => return Ok(()),
        };

        match (&task.status, &task.result, &task.error) {
            (TaskStatus::Completed, Some(result), _) => callback.on_complete(task, result).await,
            (TaskStatus::Failed, _, Some(error)) => callback.on_error(task, error).await,
            _ => Ok(()),
        }
    }

    /// Marks a queued or running task as removed. Returns false when it already finished.
    pub async fn remove_task(&self, task_id: &str) -> Result<bool> {
        let task = self.get_task(task_id).await?
            .ok_or_else(|| anyhow::anyhow!("Task not found"))?;

        if !self.storage.update(task_id, &TaskStatus::Removed.to_string()).await? {
            warn!("Task {} already finished with status {}", task_id, task.status);
            return Ok(false);
        }
        info!("Task {} removed", task_id);

        if let CallbackType::Event = task.config.callback_type {
            self.event_callback.publish(TaskEvent::Removed { task_id: task_id.to_string() });
        }
        Ok(true)
    }

    // task status query method
    pub async fn get_task_status(&self, task_id: &str) -> Result<Option<TaskStatus>> {
        self.storage.get(task_id).await?
            .map(|t| TaskStatus::try_from(t.status).map_err(anyhow::Error::msg))
            .transpose()
    }

    // task stats method
    pub async fn get_task_stats(&self, pagination: &Pagination) -> Result<TaskStats> {
        let all_tasks = self.storage.list(pagination).await?;
        let mut stats = TaskStats::default();

        for model in all_tasks {
            match TaskStatus::try_from(model.status).map_err(anyhow::Error::msg)? {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Processing => stats.processing += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
                TaskStatus::Removed => stats.removed += 1,
                TaskStatus::TimedOut => stats.timed_out += 1,
            }
        }

        Ok(stats)
    }

    // task cleanup method
    pub async fn cleanup_tasks(&self, retention_days: i64) -> Result<u64> {
        let cutoff = Utc::now() - chrono::Duration::days(retention_days);
        let removed = self.storage.cleanup_old(cutoff).await?;
        info!("Cleaned up {} finished tasks older than {} days", removed, retention_days);
        Ok(removed)
    }

    pub async fn handle_timed_out_tasks(&self) -> Result<()> {
        let timed_out_tasks = self.storage.get_timeouted().await?;

        for task in timed_out_tasks {
            // the worker may finish it between the query and the update
            if self.storage.update(&task.id, &TaskStatus::TimedOut.to_string()).await? {
                warn!("Task {} timed out", task.id);
            }
        }

        Ok(())
    }

    // get task method
    pub async fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        let model = self.storage.get(task_id).await?;
        model.map(Task::try_from).transpose()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TaskStats {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub removed: usize,
    pub timed_out: usize,
}
