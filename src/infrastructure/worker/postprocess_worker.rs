//! Post-Process Worker - 结果组合进程
//!
//! 消费 task_inference_complete（消费组 postprocess，可多实例共享），
//! 组合就绪时向 task_finish 发布 `{task_id}`

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{consume, random_consumer, MessageHandler, WorkerError};
use crate::application::services::{
    compose_results, Stream, StreamMessage, TaskError, TaskPool, TASK_ID_FIELD,
};

pub struct PostprocessWorker {
    consumer: String,
    block: Duration,
    in_stream: Stream,
    handler: ComposeHandler,
}

impl PostprocessWorker {
    pub fn new(task_pool: TaskPool, in_stream: Stream, out_stream: Stream, block: Duration) -> Self {
        Self {
            consumer: random_consumer("postprocess"),
            block,
            in_stream,
            handler: ComposeHandler {
                task_pool,
                out_stream,
            },
        }
    }

    pub fn consumer(&self) -> &str {
        &self.consumer
    }

    /// 启动 Worker
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), WorkerError> {
        tracing::info!(
            in_stream = %self.in_stream.name(),
            out_stream = %self.handler.out_stream.name(),
            consumer = %self.consumer,
            "PostprocessWorker started"
        );

        consume(
            &self.in_stream,
            &self.consumer,
            self.block,
            &cancel,
            &mut self.handler,
        )
        .await?;

        tracing::info!("PostprocessWorker stopped");
        Ok(())
    }
}

struct ComposeHandler {
    task_pool: TaskPool,
    out_stream: Stream,
}

#[async_trait]
impl MessageHandler for ComposeHandler {
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

        match compose_results(&task).await {
            Ok(true) => {
                self.out_stream.publish_task_id(task_id).await?;
                tracing::info!(task_id = %task_id, "Task result compose complete");
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(TaskError::Expired(_)) => {
                tracing::warn!(task_id = %task_id, "Task expired before composition");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
