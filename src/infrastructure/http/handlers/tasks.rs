//! Task Handlers - 组合结果查询

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::application::GetTaskResult;
use crate::domain::task::TaskResults;
use crate::infrastructure::http::dto::ApiResponse;
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 组合结果；任务不存在或尚未组合完成时 404
pub async fn get_task_result(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<ApiResponse<TaskResults>>, ApiError> {
    let result = state
        .get_task_result_handler
        .handle(GetTaskResult { task_id })
        .await?;
    Ok(Json(ApiResponse::success(result)))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{app, get_json};
    use crate::domain::task::{ComposedResult, CreateInferenceTaskRequest, TaskResults};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_result_404_until_composed() {
        let app = app();
        let (status, body) = get_json(&app.router, "/api/tasks/T1/result").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["errno"], 404);

        let req: CreateInferenceTaskRequest = serde_json::from_str(
            r#"{"requestHostIp":"h","requestHostPort":"1","requestId":"T1","objectList":[
                {"objectId":"O1","typeList":["hat"],"imageUrlList":["/a"]}]}"#,
        )
        .unwrap();
        let task = app.task_pool.create("T1", "cb", &req).await.unwrap();
        let (status, _) = get_json(&app.router, "/api/tasks/T1/result").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        task.set_postprocess_result(&TaskResults {
            request_id: "T1".to_string(),
            request_list: vec![ComposedResult {
                object_id: "O1".to_string(),
                results: vec![],
            }],
        })
        .await
        .unwrap();

        let (status, body) = get_json(&app.router, "/api/tasks/T1/result").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["requestId"], "T1");
        assert_eq!(body["data"]["requestList"][0]["objectId"], "O1");
    }
}
