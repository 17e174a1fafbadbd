//! Notifier Worker - 回调通知进程
//!
//! 消费 task_finish（消费组 notifier），把组合结果 POST 到任务的回调地址。
//! 每条消息只尝试一次，失败记录日志后照常 ack

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{consume, random_consumer, MessageHandler, WorkerError};
use crate::application::services::{Stream, StreamMessage, TaskPool, TASK_ID_FIELD};

/// Notifier 配置
#[derive(Debug, Clone)]
pub struct NotifierWorkerConfig {
    pub timeout: Duration,
    pub block: Duration,
}

impl Default for NotifierWorkerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            block: Duration::from_millis(1000),
        }
    }
}

pub struct NotifierWorker {
    config: NotifierWorkerConfig,
    consumer: String,
    stream: Stream,
    handler: NotifyHandler,
}

impl NotifierWorker {
    pub fn new(
        config: NotifierWorkerConfig,
        task_pool: TaskPool,
        stream: Stream,
    ) -> Result<Self, WorkerError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| WorkerError::Notify(e.to_string()))?;

        Ok(Self {
            config,
            consumer: random_consumer("notifier"),
            stream,
            handler: NotifyHandler { task_pool, client },
        })
    }

    /// 启动 Worker
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), WorkerError> {
        tracing::info!(
            stream = %self.stream.name(),
            consumer = %self.consumer,
            timeout_secs = self.config.timeout.as_secs(),
            "NotifierWorker started"
        );

        consume(
            &self.stream,
            &self.consumer,
            self.config.block,
            &cancel,
            &mut self.handler,
        )
        .await?;

        tracing::info!("NotifierWorker stopped");
        Ok(())
    }
}

struct NotifyHandler {
    task_pool: TaskPool,
    client: Client,
}

#[async_trait]
impl MessageHandler for NotifyHandler {
    async fn handle(
        &mut self,
        msg: &StreamMessage,
        _cancel: &CancellationToken,
    ) -> Result<(), WorkerError> {
        let Some(task_id) = msg.get(TASK_ID_FIELD) else {
            tracing::warn!(message_id = %msg.id, "Message without task_id");
            return Ok(());
        };

        let Some(task) = self.task_pool.get(task_id).await? else {
            tracing::warn!(task_id = %task_id, "No such task");
            return Ok(());
        };

        let Some(results) = task.get_postprocess_result().await? else {
            tracing::warn!(task_id = %task_id, "Task finished without composed result");
            return Ok(());
        };

        let response = self
            .client
            .post(task.callback())
            .json(&results)
            .send()
            .await
            .map_err(|e| WorkerError::Notify(format!("{}: {}", task.callback(), e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WorkerError::Notify(format!(
                "{} responded HTTP {}",
                task.callback(),
                status
            )));
        }

        tracing::info!(
            task_id = %task_id,
            callback = %task.callback(),
            results = results.result_count(),
            "Callback notified"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::StateStorePort;
    use crate::application::services::Streams;
    use crate::domain::task::{ComposedResult, CreateInferenceTaskRequest, TaskResults};
    use crate::infrastructure::store::InMemoryStateStore;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    const BLOCK: Duration = Duration::from_millis(50);

    async fn capture_server() -> (String, mpsc::UnboundedReceiver<serde_json::Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let router = Router::new().route(
            "/picAnalyseRetNotify",
            post(move |Json(body): Json<serde_json::Value>| {
                let tx = tx.clone();
                async move {
                    tx.send(body).unwrap();
                    "ok"
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{}/picAnalyseRetNotify", addr), rx)
    }

    async fn finished_task(task_pool: &TaskPool, callback: &str) {
        let req: CreateInferenceTaskRequest = serde_json::from_str(
            r#"{"requestHostIp":"h","requestHostPort":"1","requestId":"T1","objectList":[
                {"objectId":"O1","typeList":["hat"],"imageUrlList":["/a"]}]}"#,
        )
        .unwrap();
        let task = task_pool.create("T1", callback, &req).await.unwrap();
        task.set_postprocess_result(&TaskResults {
            request_id: "T1".to_string(),
            request_list: vec![ComposedResult {
                object_id: "O1".to_string(),
                results: vec![],
            }],
        })
        .await
        .unwrap();
    }

    fn setup() -> (Arc<dyn StateStorePort>, TaskPool, Streams) {
        let store: Arc<dyn StateStorePort> = Arc::new(InMemoryStateStore::new());
        let task_pool = TaskPool::new(store.clone(), Duration::from_secs(600));
        let streams = Streams::new(store.clone());
        (store, task_pool, streams)
    }

    fn config() -> NotifierWorkerConfig {
        NotifierWorkerConfig {
            timeout: Duration::from_secs(2),
            block: BLOCK,
        }
    }

    #[tokio::test]
    async fn test_posts_composed_result_to_callback() {
        let (_store, task_pool, streams) = setup();
        let (callback, mut rx) = capture_server().await;
        finished_task(&task_pool, &callback).await;
        streams.task_finish().publish_task_id("T1").await.unwrap();

        let cancel = CancellationToken::new();
        let worker = NotifierWorker::new(config(), task_pool, streams.task_finish()).unwrap();
        let handle = tokio::spawn(worker.run(cancel.clone()));

        let body = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(body["requestId"], "T1");
        assert_eq!(body["requestList"][0]["objectId"], "O1");

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_callback_is_not_transient() {
        let (_store, task_pool, streams) = setup();
        finished_task(&task_pool, "http://127.0.0.1:1/picAnalyseRetNotify").await;
        let stream = streams.task_finish();
        stream.publish_task_id("T1").await.unwrap();

        let client = Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        let mut handler = NotifyHandler { task_pool, client };
        let msg = stream.pull("test::consumer", 1, BLOCK).await.unwrap().remove(0);

        let err = handler
            .handle(&msg, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Notify(_)));
        // 消费循环据此记录日志并 ack，不会重试
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_unknown_task_is_skipped() {
        let (_store, task_pool, streams) = setup();
        let stream = streams.task_finish();
        stream.publish_task_id("missing").await.unwrap();

        let mut handler = NotifyHandler {
            task_pool,
            client: Client::new(),
        };
        let msg = stream.pull("test::consumer", 1, BLOCK).await.unwrap().remove(0);
        assert!(handler.handle(&msg, &CancellationToken::new()).await.is_ok());
    }
}
