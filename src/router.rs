//! Task routing: which queue and processor a published task name lands on,
//! plus the startup checks that the result backend and the queue are reachable.

use std::collections::HashMap;

use anyhow::Result;
use tracing::{error, info};

use crate::config::Settings;
use crate::schedule::types::TaskType;
use crate::storage::task::TaskStorage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRoute {
    pub queue: String,
    pub task_type: TaskType,
}

#[derive(Debug, Clone)]
pub struct TaskRoutes {
    default_task: String,
    routes: HashMap<String, TaskRoute>,
}

impl TaskRoutes {
    pub fn from_settings(settings: &Settings) -> Self {
        let default_task = settings.task_name();
        let mut routes = HashMap::new();
        routes.insert(
            settings.task_name(),
            TaskRoute {
                queue: settings.ai_cover_train.clone(),
                task_type: TaskType::AiCoverTrain,
            },
        );
        Self { default_task, routes }
    }

    /// Task name used when a job does not name one.
    pub fn default_task(&self) -> &str {
        &self.default_task
    }

    pub fn resolve(&self, task_name: &str) -> Option<&TaskRoute> {
        self.routes.get(task_name)
    }

    pub fn task_types(&self) -> impl Iterator<Item = &TaskType> {
        self.routes.values().map(|r| &r.task_type)
    }
}

pub async fn is_backend_running(storage: &dyn TaskStorage) -> Result<()> {
    storage.ping().await.map_err(|e| {
        error!("Result backend is not reachable: {:#}", e);
        e.context("result backend is not running")
    })?;
    info!("Result backend is running");
    Ok(())
}

// the queue lives in the same store as the results
pub async fn is_broker_running(storage: &dyn TaskStorage) -> Result<()> {
    storage.ping().await.map_err(|e| {
        error!("Task queue is not reachable: {:#}", e);
        e.context("task queue is not running")
    })?;
    info!("Task queue is running");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteTaskStorage;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_route() {
        let routes = TaskRoutes::from_settings(&Settings::default());
        let route = routes.resolve("ai.ai_cover_train").unwrap();
        assert_eq!(route.queue, "ai_cover_train");
        assert_eq!(route.task_type, TaskType::AiCoverTrain);
        assert!(routes.resolve("ai.unknown").is_none());
        assert_eq!(routes.default_task(), "ai.ai_cover_train");
        assert_eq!(routes.task_types().count(), 1);
    }

    #[tokio::test]
    async fn test_store_checks() {
        let temp_dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}", temp_dir.path().join("tasks.db").display());
        let storage = SqliteTaskStorage::new(&url).await.unwrap();

        assert!(is_backend_running(&storage).await.is_ok());
        assert!(is_broker_running(&storage).await.is_ok());
    }
}
