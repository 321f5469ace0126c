use serde::{Deserialize, Serialize};
use serde_json::Value;
use chrono::{DateTime, Utc};
use std::fmt::Display;
use std::str::FromStr;


#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum TaskType {
    AiCoverTrain,
    // more task types can be added in the future
}

impl TaskType {
    pub fn name(&self) -> &'static str {
        match self {
            TaskType::AiCoverTrain => "ai_cover_train",
        }
    }
}

impl Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for TaskType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ai_cover_train" => Ok(TaskType::AiCoverTrain),
            _ => Err(anyhow::anyhow!("Invalid task type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TaskPriority {
    Critical = 0,
    High = 1,
    Normal = 2,
    Low = 3,
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Normal
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    pub task_type: TaskType,
    pub params: TaskParams,
    #[serde(default)]
    pub callback_type: CallbackType,
    #[serde(default)]
    pub priority: TaskPriority,
    /// seconds a task may stay in `Processing`
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "params")]
pub enum TaskParams {
    AiCoverTrain(AiCoverTrainParams),
}

/// The three job inputs, each still JSON-encoded as they arrive from the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiCoverTrainParams {
    pub data: String,
    pub task_request: String,
    pub file: String,
}

impl AiCoverTrainParams {
    pub fn decode_data(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.data)
    }

    pub fn decode_request(&self) -> serde_json::Result<TrainRequest> {
        serde_json::from_str(&self.task_request)
    }

    pub fn decode_files(&self) -> serde_json::Result<Vec<UploadedFile>> {
        serde_json::from_str(&self.file)
    }
}

/// e.g. `{"voice_id": "Random-id-voice-123", "youtube_link": ["https://www.youtube.com/watch?v=h6RONxjPBf4"]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainRequest {
    pub voice_id: Option<String>,
    #[serde(default)]
    pub youtube_link: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    #[serde(default)]
    pub content_type: Option<String>,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub status: TaskStatus,
    pub config: TaskConfig,
    /// job metadata echoed back with every status record
    pub data: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<TaskResult>,
    pub error: Option<TaskError>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Removed,
    TimedOut,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Removed | TaskStatus::TimedOut
        )
    }
}

impl TryFrom<String> for TaskStatus {
    type Error = String;
    fn try_from(status: String) -> Result<Self, Self::Error> {
        match status.as_str() {
            "Pending" => Ok(TaskStatus::Pending),
            "Processing" => Ok(TaskStatus::Processing),
            "Completed" => Ok(TaskStatus::Completed),
            "Failed" => Ok(TaskStatus::Failed),
            "Removed" => Ok(TaskStatus::Removed),
            "TimedOut" => Ok(TaskStatus::TimedOut),
            _ => Err(format!("Invalid task status: {}", status)),
        }
    }
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "result")]
pub enum TaskResult {
    AiCoverTrain(TrainResponse),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainResponse {
    pub status: String,
    pub metadata: TrainMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainMetadata {
    pub task: String,
    pub tool: String,
    pub model: String,
    pub usage: Option<Value>,
}

impl TrainResponse {
    pub fn success() -> Self {
        Self {
            status: "Train model successfully.".to_string(),
            metadata: TrainMetadata {
                task: "ai_cover_train".to_string(),
                tool: "local".to_string(),
                model: "rvc_v2".to_string(),
                usage: None,
            },
        }
    }
}

/// Terminal failure record, `code` is an HTTP-like status string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "config")]
pub enum CallbackType {
    Http { url: String },
    Event,
    #[default]
    None,
}
