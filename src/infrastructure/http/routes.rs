//! HTTP Routes

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/picAnalyse", post(handlers::pic_analyse))
        .nest("/api", api_routes())
}

/// 运维查询路由
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .route("/runners", get(handlers::list_runners))
        .route("/tasks/:task_id/result", get(handlers::get_task_result))
}
