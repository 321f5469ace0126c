#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use tracing::{error, info};
use std::sync::Arc;
use std::net::SocketAddr;
use ai_cover_train::{
    cover_gen::CoverGenClient,
    router::{self, TaskRoutes},
    schedule::{AiCoverTrainProcessor, TaskManager, TaskScheduler, TaskStorage},
    storage::{HttpArtifactUploader, SqliteTaskStorage},
    train::ScriptTrainer,
    utils::{http::build_client, logger},
    AppContext, SETTINGS,
};

#[tokio::main]
async fn main() -> Result<()> {
    ai_cover_train::init_env();

    // 初始化日志系统
    let _guard = logger::init(SETTINGS.worker_log_dir.clone())?;

    info!("Starting AI Cover train worker ({})...", env!("GIT_HASH"));

    // 初始化 storage
    info!("Initializing Storage...");
    let storage: Arc<dyn TaskStorage> = Arc::new(SqliteTaskStorage::new(&SETTINGS.sqlite_path).await?);

    if let Err(e) = router::is_backend_running(storage.as_ref()).await {
        error!("Exit worker: {:#}", e);
        std::process::exit(1);
    }
    if let Err(e) = router::is_broker_running(storage.as_ref()).await {
        error!("Exit worker: {:#}", e);
        std::process::exit(1);
    }

    // 初始化外部服务客户端
    let client = build_client(SETTINGS.http_timeout)?;
    let cover_gen = CoverGenClient::new(client.clone(), SETTINGS.cover_gen_domain.clone())
        .with_registry_timeout(SETTINGS.http_timeout);
    let uploader = HttpArtifactUploader::new(client.clone(), SETTINGS.s3_upload_url.clone());
    let (program, base_args) = SETTINGS.train_program()?;
    let mut trainer = ScriptTrainer::new(program, base_args, SETTINGS.train_logs_dir.clone());
    if let Some(dir) = &SETTINGS.train_work_dir {
        trainer = trainer.with_working_dir(dir.clone());
    }

    // 初始化任务管理器
    info!("Initializing Task Manager...");
    let mut task_manager = TaskManager::new(storage.clone()).with_client(client);
    let status = task_manager.status_reporter();
    task_manager.register_processor(Box::new(AiCoverTrainProcessor::new(
        Arc::new(cover_gen),
        Arc::new(uploader),
        Arc::new(trainer),
        status,
        SETTINGS.dataset_dir.clone(),
        SETTINGS.train_logs_dir.clone(),
    )));

    // 创建应用上下文
    let ctx = Arc::new(AppContext {
        task_manager: Arc::new(task_manager),
        routes: TaskRoutes::from_settings(&SETTINGS),
    });

    // 初始化调度器并启动
    info!("Initializing Scheduler...");
    let scheduler = TaskScheduler::new(ctx.task_manager.clone());
    for task_type in ctx.routes.task_types() {
        info!("Consuming task {} from queue {}", SETTINGS.task_name(), SETTINGS.ai_cover_train);
        scheduler.spawn_worker(task_type.clone()).await;
    }

    tokio::spawn(async move {
        if let Err(e) = scheduler.run().await {
            error!("Scheduler stopped: {:#}", e);
        }
    });

    // 配置服务器地址
    let addr: SocketAddr = SETTINGS.server_addr.parse()
        .with_context(|| format!("invalid SERVER_ADDR: {}", SETTINGS.server_addr))?;

    // 启动 HTTP 服务器
    match ai_cover_train::web::start_server(ctx.clone(), addr).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e);
        }
    }

    info!("Shutting down...");
    Ok(())
}
