use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};

/// Row of the `tasks` table.
#[derive(Clone, Debug, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub task_type: String,
    pub status: String,  // TaskStatus 名称
    pub config: String,  // 存储序列化后的配置
    pub data: Option<String>,  // 任务元数据 (JSON)
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<String>,  // 存储序列化后的结果
    pub error: Option<String>,  // 存储序列化后的 TaskError
    pub priority: i32,
    pub timeout: Option<i64>,
}
