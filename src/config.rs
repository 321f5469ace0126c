use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use once_cell::sync::Lazy;

const AI_QUERY_NAME: &str = "ai";
const AI_COVER_TRAIN: &str = "ai_cover_train";
const APP_AI_COVER_GEN_DOMAIN: &str = "http://127.0.0.1:8000";
const S3_UPLOAD_URL: &str = "http://127.0.0.1:9000/upload";
const AI_CELERY_SQLITE_PATH: &str = "sqlite://./train_data/database/tasks.db?mode=rwc";
const DATASET_DIR: &str = "./dataset";
const TRAIN_LOGS_DIR: &str = "./logs";
const WORKER_LOG_DIR: &str = "./worker_logs";
const TRAIN_COMMAND: &str = "python main.py";
const SERVER_ADDR: &str = "127.0.0.1:7300";
const HTTP_TIMEOUT_SECS: u64 = 60;

pub static SETTINGS: Lazy<Settings> = Lazy::new(Settings::from_env);

/// Worker settings, resolved from the process environment, then `.env`,
/// then the built-in defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub ai_query_name: String,
    pub ai_cover_train: String,
    pub cover_gen_domain: String,
    pub s3_upload_url: String,
    pub sqlite_path: String,
    pub dataset_dir: PathBuf,
    pub train_logs_dir: PathBuf,
    pub worker_log_dir: String,
    pub train_command: String,
    /// Directory the training command runs in, the current one when unset.
    pub train_work_dir: Option<PathBuf>,
    pub server_addr: String,
    /// Connect timeout, and the request timeout of model registry calls.
    pub http_timeout: Duration,
}

fn var_or(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(value) => value,
        Err(_) => dotenv::var(key).unwrap_or_else(|_| default.to_string()),
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ai_query_name: AI_QUERY_NAME.to_string(),
            ai_cover_train: AI_COVER_TRAIN.to_string(),
            cover_gen_domain: APP_AI_COVER_GEN_DOMAIN.to_string(),
            s3_upload_url: S3_UPLOAD_URL.to_string(),
            sqlite_path: AI_CELERY_SQLITE_PATH.to_string(),
            dataset_dir: PathBuf::from(DATASET_DIR),
            train_logs_dir: PathBuf::from(TRAIN_LOGS_DIR),
            worker_log_dir: WORKER_LOG_DIR.to_string(),
            train_command: TRAIN_COMMAND.to_string(),
            train_work_dir: None,
            server_addr: SERVER_ADDR.to_string(),
            http_timeout: Duration::from_secs(HTTP_TIMEOUT_SECS),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let http_timeout = var_or("HTTP_TIMEOUT_SECS", "")
            .parse()
            .unwrap_or(HTTP_TIMEOUT_SECS);

        Self {
            ai_query_name: var_or("AI_QUERY_NAME", AI_QUERY_NAME),
            ai_cover_train: var_or("AI_COVER_TRAIN", AI_COVER_TRAIN),
            cover_gen_domain: var_or("APP_AI_COVER_GEN_DOMAIN", APP_AI_COVER_GEN_DOMAIN)
                .trim_end_matches('/')
                .to_string(),
            s3_upload_url: var_or("S3_UPLOAD_URL", S3_UPLOAD_URL),
            sqlite_path: var_or("AI_CELERY_SQLITE_PATH", AI_CELERY_SQLITE_PATH),
            dataset_dir: PathBuf::from(var_or("DATASET_DIR", DATASET_DIR)),
            train_logs_dir: PathBuf::from(var_or("TRAIN_LOGS_DIR", TRAIN_LOGS_DIR)),
            worker_log_dir: var_or("WORKER_LOG_DIR", WORKER_LOG_DIR),
            train_command: var_or("TRAIN_COMMAND", TRAIN_COMMAND),
            train_work_dir: Some(var_or("TRAIN_WORK_DIR", ""))
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
            server_addr: var_or("SERVER_ADDR", SERVER_ADDR),
            http_timeout: Duration::from_secs(http_timeout),
        }
    }

    /// Fully qualified task name, e.g. `ai.ai_cover_train`.
    pub fn task_name(&self) -> String {
        format!("{}.{}", self.ai_query_name, self.ai_cover_train)
    }

    /// Training command split into the program and its leading arguments.
    pub fn train_program(&self) -> Result<(String, Vec<String>)> {
        let mut parts = self.train_command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| anyhow::anyhow!("TRAIN_COMMAND is empty"))?;
        Ok((program, parts.collect()))
    }
}
