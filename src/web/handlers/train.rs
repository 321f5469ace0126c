use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::schedule::{AiCoverTrainParams, CallbackType, TaskConfig, TaskParams, TaskPriority};
use crate::utils::http::HttpResponse;
use crate::AppContext;

pub fn train_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/train", post(train))
        .with_state(ctx)
}

/// `data`, `task_request` and `file` are JSON documents encoded as strings.
#[derive(Debug, Deserialize, Serialize)]
pub struct TrainJobRequest {
    pub task_id: Option<String>,
    /// e.g. `ai.ai_cover_train`, the configured task when absent.
    pub task_name: Option<String>,
    pub data: String,
    pub task_request: String,
    pub file: String,
    pub callback_url: Option<String>,
    #[serde(default)]
    pub priority: TaskPriority,
    pub timeout: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct TrainJobAccepted {
    pub task_id: String,
}

pub async fn train(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<TrainJobRequest>,
) -> impl IntoResponse {
    let task_name = req.task_name.as_deref().unwrap_or(ctx.routes.default_task());
    let Some(route) = ctx.routes.resolve(task_name) else {
        error!("Unknown task: {}", task_name);
        let response = HttpResponse::<Option<TrainJobAccepted>>::new(
            400,
            format!("Unknown task: {}", task_name),
            None,
        );
        return (StatusCode::BAD_REQUEST, Json(response)).into_response();
    };
    info!("Routing task {} to queue {}", task_name, route.queue);
    let task_type = route.task_type.clone();

    let callback_type = match req.callback_url {
        Some(url) => CallbackType::Http { url },
        None => CallbackType::None,
    };

    let task_config = TaskConfig {
        task_type,
        params: TaskParams::AiCoverTrain(AiCoverTrainParams {
            data: req.data,
            task_request: req.task_request,
            file: req.file,
        }),
        callback_type,
        priority: req.priority,
        timeout: req.timeout,
    };

    match ctx.task_manager.create_task(task_config, req.task_id).await {
        Ok(task) => {
            info!("Task added successfully: {}", task.id);
            let response = HttpResponse::new(
                0,
                "Task added successfully".to_string(),
                Some(TrainJobAccepted { task_id: task.id }),
            );
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            error!("Failed to create task: {:#}", e);
            let response = HttpResponse::<Option<TrainJobAccepted>>::new(
                400,
                format!("{:#}", e),
                None,
            );
            (StatusCode::BAD_REQUEST, Json(response)).into_response()
        }
    }
}
