use axum::Router;
use std::sync::Arc;
use crate::AppContext;

pub mod schedule;
pub mod train;

pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .nest("/ai-cover", train::train_router(ctx.clone()))
        .nest("/schedule", schedule::schedule_router(ctx.task_manager.clone()))
}
