use async_trait::async_trait;
use anyhow::Result;
use chrono::{DateTime, Utc};
use crate::storage::task::entity::Model as TaskModel;
use crate::web::Pagination;
pub mod sqlite;
pub mod entity;
pub mod mapping;

pub use sqlite::SqliteTaskStorage;

/// Queue and job-status store. Statuses are passed by their `TaskStatus` name.
#[async_trait]
pub trait TaskStorage: Send + Sync + 'static {
    /// Insert or replace the whole row.
    async fn create(&self, model: &TaskModel) -> Result<()>;
    async fn list(&self, pagination: &Pagination) -> Result<Vec<TaskModel>>;
    /// Atomically move the next `Pending` task of `task_type` to `Processing`.
    async fn claim_next(&self, task_type: &str) -> Result<Option<TaskModel>>;
    async fn get(&self, task_id: &str) -> Result<Option<TaskModel>>;
    /// Move an unfinished task to `status`. Returns false once it reached a terminal status.
    async fn update(&self, task_id: &str, status: &str) -> Result<bool>;
    /// Record the job metadata and start time. Returns false for finished tasks.
    async fn mark_started(&self, task_id: &str, data: Option<&str>) -> Result<bool>;
    /// Write a terminal status. A task that already has one is never overwritten.
    async fn finish(
        &self,
        task_id: &str,
        status: &str,
        data: Option<&str>,
        result: Option<&str>,
        error: Option<&str>,
    ) -> Result<bool>;
    async fn get_timeouted(&self) -> Result<Vec<TaskModel>>;
    async fn cleanup_old(&self, before: DateTime<Utc>) -> Result<u64>;
    async fn ping(&self) -> Result<()>;
}
