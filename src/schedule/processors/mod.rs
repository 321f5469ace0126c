pub mod ai_cover_train;

use async_trait::async_trait;
use anyhow::Result;
use crate::schedule::error::TrainError;
use crate::schedule::types::{Task, TaskResult, TaskType, TaskParams};

pub use ai_cover_train::AiCoverTrainProcessor;

#[async_trait]
pub trait TaskProcessor: Send + Sync {
    fn task_type(&self) -> TaskType;
    /// Runs the task body. Terminal status reporting is left to the caller.
    async fn process(&self, task: &Task) -> Result<TaskResult, TrainError>;
    fn validate_params(&self, params: &TaskParams) -> Result<()>;
}
