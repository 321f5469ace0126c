mod task_manager;
mod worker;

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::sync::Mutex;
use anyhow::Result;

pub use task_manager::{TaskManager, TaskStats};
pub use worker::TaskWorker;
use crate::schedule::types::TaskType;

const TIMEOUT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const CLEANUP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
// finished tasks are kept this long for status queries
const TASK_RETENTION_DAYS: i64 = 30;

pub struct TaskScheduler {
    task_manager: Arc<TaskManager>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    poll_interval: Duration,
}

impl TaskScheduler {
    pub fn new(task_manager: Arc<TaskManager>) -> Self {
        Self {
            task_manager,
            workers: Mutex::new(Vec::new()),
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub async fn spawn_worker(&self, task_type: TaskType) {
        let worker = TaskWorker::new(self.task_manager.clone(), task_type)
            .with_interval(self.poll_interval);
        let handle = tokio::spawn(async move {
            worker.run().await;
        });
        self.workers.lock().await.push(handle);
    }

    pub async fn run(&self) -> Result<()> {
        // start task timeout check and retention cleanup
        let tm = self.task_manager.clone();
        tokio::spawn(async move {
            let mut timeout_sweep = tokio::time::interval(TIMEOUT_SWEEP_INTERVAL);
            let mut cleanup = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                tokio::select! {
                    _ = timeout_sweep.tick() => {
                        if let Err(e) = tm.handle_timed_out_tasks().await {
                            tracing::error!("Error handling timed out tasks: {}", e);
                        }
                    }
                    _ = cleanup.tick() => {
                        if let Err(e) = tm.cleanup_tasks(TASK_RETENTION_DAYS).await {
                            tracing::error!("Error cleaning up finished tasks: {}", e);
                        }
                    }
                }
            }
        });

        // wait for all workers to finish
        let mut workers = self.workers.lock().await;
        for worker in workers.drain(..) {
            worker.await?;
        }

        Ok(())
    }
}
