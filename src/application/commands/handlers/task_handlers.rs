//! Task Command Handlers

use crate::application::commands::{CreateInferenceTask, CreateInferenceTaskResponse};
use crate::application::error::ApplicationError;
use crate::application::services::{Stream, TaskPool};

/// CreateInferenceTask Handler
///
/// 持久化任务并发布到 task_create 流；请求 ID 即任务 ID
pub struct CreateInferenceTaskHandler {
    task_pool: TaskPool,
    task_create: Stream,
}

impl CreateInferenceTaskHandler {
    pub fn new(task_pool: TaskPool, task_create: Stream) -> Self {
        Self {
            task_pool,
            task_create,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateInferenceTask,
    ) -> Result<CreateInferenceTaskResponse, ApplicationError> {
        let request = cmd.request;
        if request.request_id.trim().is_empty() {
            return Err(ApplicationError::validation("requestId must not be empty"));
        }

        let callback = request.callback_url();
        tracing::info!(
            task_id = %request.request_id,
            callback = %callback,
            objects = request.object_list.len(),
            "Receive inference request"
        );

        let task = self
            .task_pool
            .create(&request.request_id, &callback, &request)
            .await?;
        let message_id = self.task_create.publish_task_id(task.task_id()).await?;

        tracing::info!(
            task_id = %task.task_id(),
            message_id = %message_id,
            "Inference task queued"
        );

        Ok(CreateInferenceTaskResponse {
            task_id: task.task_id().to_string(),
            callback,
            message_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::StateStorePort;
    use crate::application::services::{Streams, TASK_ID_FIELD};
    use crate::infrastructure::store::InMemoryStateStore;
    use std::sync::Arc;
    use std::time::Duration;

    fn handler() -> (Streams, TaskPool, CreateInferenceTaskHandler) {
        let store: Arc<dyn StateStorePort> = Arc::new(InMemoryStateStore::new());
        let streams = Streams::new(store.clone());
        let tasks = TaskPool::new(store, Duration::from_secs(60));
        let handler = CreateInferenceTaskHandler::new(tasks.clone(), streams.task_create());
        (streams, tasks, handler)
    }

    fn command(request_id: &str) -> CreateInferenceTask {
        CreateInferenceTask {
            request: serde_json::from_value(serde_json::json!({
                "requestHostIp": "10.0.0.5",
                "requestHostPort": "8080",
                "requestId": request_id,
                "objectList": [
                    {"objectId": "O1", "typeList": ["hat"], "imageUrlList": ["/a.jpg"]}
                ]
            }))
            .unwrap(),
        }
    }

    #[tokio::test]
    async fn test_create_persists_and_publishes() {
        let (streams, tasks, handler) = handler();
        let response = handler.handle(command("T1")).await.unwrap();
        assert_eq!(response.task_id, "T1");
        assert_eq!(response.callback, "http://10.0.0.5:8080/picAnalyseRetNotify");

        let task = tasks.get("T1").await.unwrap().unwrap();
        assert_eq!(task.callback(), response.callback);

        let msgs = streams
            .task_create()
            .pull("d", 10, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].get(TASK_ID_FIELD), Some("T1"));
    }

    #[tokio::test]
    async fn test_empty_request_id_is_rejected() {
        let (_streams, _tasks, handler) = handler();
        assert!(matches!(
            handler.handle(command(" ")).await,
            Err(ApplicationError::ValidationError(_))
        ));
    }
}
