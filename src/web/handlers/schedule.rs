use axum::{
    routing::get,
    Router,
    extract::{State, Path, Query, Json},
    response::IntoResponse,
    http::StatusCode,
};
use std::sync::Arc;
use serde::Serialize;

use crate::web::Pagination;
use crate::schedule::scheduler::TaskManager;
use tracing::{error, info};

pub fn schedule_router(task_manager: Arc<TaskManager>) -> Router {
    Router::new()
        .route("/tasks/stats", get(get_task_stats))
        .route("/tasks/:task_id", get(get_task).delete(remove_task))
        .route("/tasks/:task_id/status", get(get_task_status))
        .with_state(task_manager)
}

#[derive(Debug, Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(error: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

// Get task endpoint
async fn get_task(
    State(task_manager): State<Arc<TaskManager>>,
    Path(task_id): Path<String>,
) -> impl IntoResponse {
    match task_manager.get_task(&task_id).await {
        Ok(Some(task)) => (
            StatusCode::OK,
            Json(ApiResponse::success(task))
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Task not found".to_string()))
        ),
        Err(e) => {
            error!("Failed to get task: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string()))
            )
        },
    }
}

// Get task status endpoint
async fn get_task_status(
    State(task_manager): State<Arc<TaskManager>>,
    Path(task_id): Path<String>,
) -> impl IntoResponse {
    match task_manager.get_task_status(&task_id).await {
        Ok(Some(status)) => (
            StatusCode::OK,
            Json(ApiResponse::success(status))
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Task not found".to_string()))
        ),
        Err(e) => {
            error!("Failed to get task status: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string()))
            )
        },
    }
}

// Remove task endpoint, the worker skips it before training
async fn remove_task(
    State(task_manager): State<Arc<TaskManager>>,
    Path(task_id): Path<String>,
) -> impl IntoResponse {
    match task_manager.get_task_status(&task_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<bool>::error("Task not found".to_string()))
            );
        }
        Err(e) => {
            error!("Failed to load task {}: {}", task_id, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<bool>::error(e.to_string()))
            );
        }
    }

    match task_manager.remove_task(&task_id).await {
        Ok(true) => {
            info!("Task {} marked as removed", task_id);
            (StatusCode::OK, Json(ApiResponse::success(true)))
        }
        Ok(false) => (
            StatusCode::CONFLICT,
            Json(ApiResponse::<bool>::error("Task already finished".to_string()))
        ),
        Err(e) => {
            error!("Failed to remove task: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<bool>::error(e.to_string()))
            )
        },
    }
}

// Get task stats endpoint
async fn get_task_stats(
    State(task_manager): State<Arc<TaskManager>>,
    Query(pagination): Query<Pagination>,
) -> impl IntoResponse {
    match task_manager.get_task_stats(&pagination.check()).await {
        Ok(stats) => (
            StatusCode::OK,
            Json(ApiResponse::success(stats)),
        ),
        Err(e) => {
            error!("Failed to get task stats: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string()))
            )
        },
    }
}
