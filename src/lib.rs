pub mod config;
pub mod cover_gen;
pub mod router;
pub mod schedule;
pub mod storage;
pub mod train;
pub mod utils;
pub mod web;

use std::sync::Arc;
use router::TaskRoutes;
use schedule::TaskManager;

pub use config::{Settings, SETTINGS};

pub struct AppContext {
    pub task_manager: Arc<TaskManager>,
    pub routes: TaskRoutes,
}

pub fn init_env() {
    dotenv::dotenv().ok();

    // 确保数据目录存在
    if let Some(db_path) = SETTINGS.sqlite_path.strip_prefix("sqlite://") {
        let db_path = db_path.split('?').next().unwrap_or(db_path);
        if let Some(dir) = std::path::Path::new(db_path).parent() {
            std::fs::create_dir_all(dir).unwrap_or_else(|e| {
                eprintln!("Failed to create database directory: {}", e);
            });
        }
    }
}
