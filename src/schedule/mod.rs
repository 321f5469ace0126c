pub mod types;
pub mod error;
pub mod status;
pub mod processors;
pub mod scheduler;
pub mod callback;
#[cfg(test)]
mod tests;

// 重导出主要类型
pub use types::{
    Task, TaskType, TaskConfig, TaskParams, TaskStatus, TaskResult, TaskError,
    TaskPriority, AiCoverTrainParams, TrainRequest, TrainResponse, UploadedFile, CallbackType
};
pub use error::TrainError;
pub use status::StatusReporter;

// 使用 storage 模块中的类型
pub use crate::storage::task::TaskStorage;

// 重导出处理器接口
pub use processors::TaskProcessor;
pub use processors::ai_cover_train::AiCoverTrainProcessor;

// 重导出调度器接口
pub use scheduler::{TaskManager, TaskScheduler, TaskWorker};
