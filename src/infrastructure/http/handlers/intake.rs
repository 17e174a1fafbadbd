//! Intake Handler - 推理任务创建入口

use axum::extract::rejection::JsonRejection;
use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::application::CreateInferenceTask;
use crate::domain::task::CreateInferenceTaskRequest;
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 创建任务：持久化并发布到调度流，成功时返回空响应体
pub async fn pic_analyse(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateInferenceTaskRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    state
        .create_task_handler
        .handle(CreateInferenceTask { request })
        .await?;

    Ok(StatusCode::OK)
}
