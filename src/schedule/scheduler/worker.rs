use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{info, error};
use anyhow::Result;

use crate::schedule::types::TaskType;
use super::TaskManager;

/// Processes tasks of one type strictly one at a time.
pub struct TaskWorker {
    // task manager
    task_manager: Arc<TaskManager>,
    // task type. e.g. AiCoverTrain
    task_type: TaskType,
    // interval for polling the queue when idle. e.g. 1 second
    interval: Duration,
}

impl TaskWorker {
    pub fn new(task_manager: Arc<TaskManager>, task_type: TaskType) -> Self {
        Self {
            task_manager,
            task_type,
            interval: Duration::from_secs(1),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub async fn run(&self) {
        info!("Worker for {} tasks started", self.task_type);
        loop {
            match self.process_next_task().await {
                Ok(true) => continue,  // continue to process next task
                Ok(false) => sleep(self.interval).await, // no task, wait
                Err(e) => {
                    error!("Error processing task: {}", e);
                    sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    /// Returns false when the queue had nothing for this worker.
    pub async fn process_next_task(&self) -> Result<bool> {
        // get next task to process
        let task = match self.task_manager.get_next_task(&self.task_type).await? {
            Some(task) => task,
            None => return Ok(false),
        };

        info!("Processing {} task: {}", self.task_type, task.id);
        self.task_manager.process_task(&task).await?;
        Ok(true)
    }
}
