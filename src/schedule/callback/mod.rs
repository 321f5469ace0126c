use async_trait::async_trait;
use anyhow::Result;
use serde::Serialize;
use crate::schedule::types::{Task, TaskError, TaskResult, TaskStatus};

#[async_trait]
pub trait TaskCallback: Send + Sync {
    async fn on_complete(&self, task: &Task, result: &TaskResult) -> Result<()>;
    async fn on_error(&self, task: &Task, error: &TaskError) -> Result<()>;
}

// HTTP 回调实现
pub struct HttpCallback {
    client: reqwest::Client,
    callback_url: String,
}

#[derive(Debug, Serialize)]
struct CallbackPayload<'a, T> {
    task_id: &'a str,
    status: TaskStatus,
    data: T,
}

impl HttpCallback {
    pub fn new(client: reqwest::Client, callback_url: String) -> Self {
        Self { client, callback_url }
    }

    async fn send_callback<T: Serialize + Send + Sync>(&self, payload: CallbackPayload<'_, T>) -> Result<()> {
        self.client
            .post(&self.callback_url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl TaskCallback for HttpCallback {
    async fn on_complete(&self, task: &Task, result: &TaskResult) -> Result<()> {
        let payload = CallbackPayload {
            task_id: &task.id,
            status: TaskStatus::Completed,
            data: result,
        };
        self.send_callback(payload).await
    }

    async fn on_error(&self, task: &Task, error: &TaskError) -> Result<()> {
        let payload = CallbackPayload {
            task_id: &task.id,
            status: TaskStatus::Failed,
            data: error,
        };
        self.send_callback(payload).await
    }
}

// 内部事件回调实现
#[derive(Clone)]
pub struct EventCallback {
    pub sender: tokio::sync::broadcast::Sender<TaskEvent>,
}

#[derive(Debug, Clone)]
pub enum TaskEvent {
    Completed { task_id: String, result: TaskResult },
    Failed { task_id: String, error: TaskError },
    Removed { task_id: String },
}

impl EventCallback {
    pub fn new(capacity: usize) -> (Self, tokio::sync::broadcast::Receiver<TaskEvent>) {
        let (sender, receiver) = tokio::sync::broadcast::channel(capacity);
        (Self { sender }, receiver)
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<TaskEvent> {
        self.sender.subscribe()
    }

    // no subscriber is not an error
    pub fn publish(&self, event: TaskEvent) {
        let _ = self.sender.send(event);
    }
}

#[async_trait]
impl TaskCallback for EventCallback {
    async fn on_complete(&self, task: &Task, result: &TaskResult) -> Result<()> {
        self.publish(TaskEvent::Completed {
            task_id: task.id.clone(),
            result: result.clone(),
        });
        Ok(())
    }

    async fn on_error(&self, task: &Task, error: &TaskError) -> Result<()> {
        self.publish(TaskEvent::Failed {
            task_id: task.id.clone(),
            error: error.clone(),
        });
        Ok(())
    }
}
