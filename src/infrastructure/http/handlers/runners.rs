//! Runner Handlers - runner 注册表快照

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::application::{ListRunners, RunnerListResponse};
use crate::infrastructure::http::dto::ApiResponse;
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 所有已注册 runner 及其存活状态，附名额上限
pub async fn list_runners(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<RunnerListResponse>>, ApiError> {
    let result = state.list_runners_handler.handle(ListRunners).await?;
    Ok(Json(ApiResponse::success(result)))
}
