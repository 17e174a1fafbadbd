//! Task / Runner Query Handlers

use serde::Serialize;

use crate::application::error::ApplicationError;
use crate::application::queries::{GetTaskResult, ListRunners};
use crate::application::services::{RunnerPool, TaskPool};
use crate::domain::runner::RunnerStatus;
use crate::domain::task::TaskResults;

// ============================================================================
// Response DTOs
// ============================================================================

/// runner 列表响应
#[derive(Debug, Clone, Serialize)]
pub struct RunnerListResponse {
    pub max_runners: usize,
    pub count: usize,
    pub alive: usize,
    pub runners: Vec<RunnerStatus>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GetTaskResult Handler
///
/// 任务未知或结果尚未组合完成都返回 NotFound
pub struct GetTaskResultHandler {
    task_pool: TaskPool,
}

impl GetTaskResultHandler {
    pub fn new(task_pool: TaskPool) -> Self {
        Self { task_pool }
    }

    pub async fn handle(&self, query: GetTaskResult) -> Result<TaskResults, ApplicationError> {
        let task = self
            .task_pool
            .get(&query.task_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Task", &query.task_id))?;

        task.get_postprocess_result()
            .await?
            .ok_or_else(|| ApplicationError::not_found("Task result", &query.task_id))
    }
}

/// ListRunners Handler
pub struct ListRunnersHandler {
    runner_pool: RunnerPool,
}

impl ListRunnersHandler {
    pub fn new(runner_pool: RunnerPool) -> Self {
        Self { runner_pool }
    }

    pub async fn handle(&self, _query: ListRunners) -> Result<RunnerListResponse, ApplicationError> {
        let mut runners = Vec::new();
        for runner in self.runner_pool.runners().await? {
            runners.push(runner.status().await?);
        }

        Ok(RunnerListResponse {
            max_runners: self.runner_pool.max_runners().await?,
            count: runners.len(),
            alive: runners.iter().filter(|r| r.alive).count(),
            runners,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::runner_pool::tests::RecordingLauncher;
    use crate::infrastructure::store::InMemoryStateStore;
    use chrono::Utc;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_task_result_not_found_until_composed() {
        let store = Arc::new(InMemoryStateStore::new());
        let tasks = TaskPool::new(store, Duration::from_secs(60));
        let handler = GetTaskResultHandler::new(tasks.clone());

        let missing = handler
            .handle(GetTaskResult {
                task_id: "T1".into(),
            })
            .await;
        assert!(matches!(missing, Err(ApplicationError::NotFound { .. })));

        let req = serde_json::from_str(
            r#"{"requestHostIp":"h","requestHostPort":"1","requestId":"T1","objectList":[]}"#,
        )
        .unwrap();
        let task = tasks.create("T1", "cb", &req).await.unwrap();
        assert!(handler
            .handle(GetTaskResult {
                task_id: "T1".into()
            })
            .await
            .is_err());

        let results = TaskResults {
            request_id: "T1".into(),
            request_list: vec![],
        };
        task.set_postprocess_result(&results).await.unwrap();
        let found = handler
            .handle(GetTaskResult {
                task_id: "T1".into(),
            })
            .await
            .unwrap();
        assert_eq!(found, results);
    }

    #[tokio::test]
    async fn test_list_runners_reports_alive() {
        let store = Arc::new(InMemoryStateStore::new());
        let pool = RunnerPool::new(store, Arc::new(RecordingLauncher::default()));
        pool.set_max_runners(5).await.unwrap();
        let a = pool.new_runner("hat").await.unwrap();
        pool.new_runner("intrusion").await.unwrap();
        a.update_heartbeat(Utc::now(), Duration::from_secs(10))
            .await
            .unwrap();

        let response = ListRunnersHandler::new(pool).handle(ListRunners).await.unwrap();
        assert_eq!(response.max_runners, 5);
        assert_eq!(response.count, 2);
        assert_eq!(response.alive, 1);
    }
}
