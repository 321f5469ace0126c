use std::str::FromStr;

use async_trait::async_trait;
use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use super::TaskStorage;
use crate::schedule::types::TaskStatus;
use crate::storage::task::entity::Model as TaskModel;
use crate::web::Pagination;

pub struct SqliteTaskStorage {
    pool: SqlitePool,
}

// fixed width so that text ordering matches time ordering
fn ts(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl SqliteTaskStorage {
    pub async fn new(database_url: &str) -> Result<Self> {
        info!("Initializing SQLite task storage at {}", database_url);
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        // 创建任务表
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                task_type TEXT NOT NULL,
                status TEXT NOT NULL,
                config TEXT NOT NULL,
                data TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT,
                result TEXT,
                error TEXT,
                priority INTEGER NOT NULL,
                timeout INTEGER
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_tasks_queue ON tasks (task_type, status, priority, created_at)",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl TaskStorage for SqliteTaskStorage {
    async fn create(&self, model: &TaskModel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO tasks
            (id, task_type, status, config, data, created_at, updated_at, started_at, completed_at, result, error, priority, timeout)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&model.id)
        .bind(&model.task_type)
        .bind(&model.status)
        .bind(&model.config)
        .bind(&model.data)
        .bind(ts(model.created_at))
        .bind(ts(model.updated_at))
        .bind(model.started_at.map(ts))
        .bind(model.completed_at.map(ts))
        .bind(&model.result)
        .bind(&model.error)
        .bind(model.priority)
        .bind(model.timeout)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self, pagination: &Pagination) -> Result<Vec<TaskModel>> {
        let pagination = pagination.check();
        let models = sqlx::query_as::<_, TaskModel>(
            "SELECT * FROM tasks ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(pagination.limit() as i64)
        .bind(pagination.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(models)
    }

    async fn claim_next(&self, task_type: &str) -> Result<Option<TaskModel>> {
        let now = ts(Utc::now());
        let model = sqlx::query_as::<_, TaskModel>(
            r#"
            UPDATE tasks
            SET status = ?, started_at = ?, updated_at = ?
            WHERE id = (
                SELECT id FROM tasks
                WHERE status = ? AND task_type = ?
                ORDER BY priority ASC, created_at ASC
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(TaskStatus::Processing.to_string())
        .bind(&now)
        .bind(&now)
        .bind(TaskStatus::Pending.to_string())
        .bind(task_type)
        .fetch_optional(&self.pool)
        .await?;

        Ok(model)
    }

    async fn get(&self, task_id: &str) -> Result<Option<TaskModel>> {
        let model = sqlx::query_as::<_, TaskModel>("SELECT * FROM tasks WHERE id = ?")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(model)
    }

    async fn update(&self, task_id: &str, status: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE tasks SET status = ?, updated_at = ? WHERE id = ? AND status IN (?, ?)",
        )
        .bind(status)
        .bind(ts(Utc::now()))
        .bind(task_id)
        .bind(TaskStatus::Pending.to_string())
        .bind(TaskStatus::Processing.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_started(&self, task_id: &str, data: Option<&str>) -> Result<bool> {
        let now = ts(Utc::now());
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET status = ?,
                data = COALESCE(?, data),
                started_at = COALESCE(started_at, ?),
                updated_at = ?
            WHERE id = ? AND status IN (?, ?)
            "#,
        )
        .bind(TaskStatus::Processing.to_string())
        .bind(data)
        .bind(&now)
        .bind(&now)
        .bind(task_id)
        .bind(TaskStatus::Pending.to_string())
        .bind(TaskStatus::Processing.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn finish(
        &self,
        task_id: &str,
        status: &str,
        data: Option<&str>,
        result: Option<&str>,
        error: Option<&str>,
    ) -> Result<bool> {
        let now = ts(Utc::now());
        let outcome = sqlx::query(
            r#"
            UPDATE tasks
            SET status = ?, data = COALESCE(data, ?), result = ?, error = ?, updated_at = ?, completed_at = ?
            WHERE id = ? AND status IN (?, ?)
            "#,
        )
        .bind(status)
        .bind(data)
        .bind(result)
        .bind(error)
        .bind(&now)
        .bind(&now)
        .bind(task_id)
        .bind(TaskStatus::Pending.to_string())
        .bind(TaskStatus::Processing.to_string())
        .execute(&self.pool)
        .await?;

        Ok(outcome.rows_affected() > 0)
    }

    async fn get_timeouted(&self) -> Result<Vec<TaskModel>> {
        let processing = sqlx::query_as::<_, TaskModel>(
            r#"
            SELECT * FROM tasks
            WHERE status = ?
            AND started_at IS NOT NULL
            AND timeout IS NOT NULL
            "#,
        )
        .bind(TaskStatus::Processing.to_string())
        .fetch_all(&self.pool)
        .await?;

        let now = Utc::now();
        Ok(processing
            .into_iter()
            .filter(|model| match (model.started_at, model.timeout) {
                (Some(started_at), Some(timeout)) => (now - started_at).num_seconds() > timeout,
                _ => false,
            })
            .collect())
    }

    async fn cleanup_old(&self, before: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM tasks
            WHERE status IN (?, ?, ?, ?)
            AND updated_at < ?
            "#,
        )
        .bind(TaskStatus::Completed.to_string())
        .bind(TaskStatus::Failed.to_string())
        .bind(TaskStatus::Removed.to_string())
        .bind(TaskStatus::TimedOut.to_string())
        .bind(ts(before))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
