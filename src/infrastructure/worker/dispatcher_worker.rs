//! Dispatcher Worker - 任务分配进程
//!
//! 消费 task_create：为每个 (object, model) 写入 pending，回收死亡 runner，
//! 逐对分配。资源耗尽的对按固定间隔重试，超过次数后放弃，任务等待过期

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{consume, MessageHandler, WorkerError};
use crate::application::services::{
    PairOutcome, ProcDispatcher, Stream, StreamMessage, Task, TaskError, TaskPool, TASK_ID_FIELD,
};
use crate::domain::task::InferenceState;

/// Dispatcher 配置
#[derive(Debug, Clone)]
pub struct DispatcherWorkerConfig {
    /// 固定消费者名称，重启后接管未确认消息
    pub consumer: String,
    pub block: Duration,
    pub max_runners: usize,
    /// 无心跳多久后回收 runner
    pub reap_grace: Duration,
    pub retry_interval: Duration,
    pub max_retries: u32,
}

impl Default for DispatcherWorkerConfig {
    fn default() -> Self {
        Self {
            consumer: "dispatcher::consumer".to_string(),
            block: Duration::from_millis(1000),
            max_runners: 10,
            reap_grace: Duration::from_secs(70),
            retry_interval: Duration::from_millis(2000),
            max_retries: 30,
        }
    }
}

pub struct DispatcherWorker {
    config: DispatcherWorkerConfig,
    stream: Stream,
    handler: DispatchHandler,
}

impl DispatcherWorker {
    pub fn new(
        config: DispatcherWorkerConfig,
        task_pool: TaskPool,
        dispatcher: ProcDispatcher,
        stream: Stream,
    ) -> Self {
        let handler = DispatchHandler {
            task_pool,
            dispatcher,
            reap_grace: config.reap_grace,
            retry_interval: config.retry_interval,
            max_retries: config.max_retries,
        };
        Self {
            config,
            stream,
            handler,
        }
    }

    /// 启动 Worker
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), WorkerError> {
        self.handler
            .dispatcher
            .strategy()
            .pool()
            .set_max_runners(self.config.max_runners)
            .await?;

        tracing::info!(
            max_runners = self.config.max_runners,
            retry_interval_ms = self.config.retry_interval.as_millis() as u64,
            max_retries = self.config.max_retries,
            "DispatcherWorker started"
        );

        consume(
            &self.stream,
            &self.config.consumer,
            self.config.block,
            &cancel,
            &mut self.handler,
        )
        .await?;

        tracing::info!("DispatcherWorker stopped");
        Ok(())
    }
}

/// task_create 消息处理
struct DispatchHandler {
    task_pool: TaskPool,
    dispatcher: ProcDispatcher,
    reap_grace: Duration,
    retry_interval: Duration,
    max_retries: u32,
}

impl DispatchHandler {
    /// 仍处于 pending 的 (object_id, model)；重复投递时跳过已在处理的对
    async fn pending_pairs(&self, task: &Task) -> Result<Vec<(String, String)>, TaskError> {
        let mut pairs = Vec::new();
        for (obj, model) in task.raw_request().inference_pairs() {
            if task.get_inference_state(obj, model).await? == InferenceState::Pending {
                pairs.push((obj.object_id.clone(), model.to_string()));
            }
        }
        Ok(pairs)
    }

    fn failed(outcomes: Vec<PairOutcome>) -> Vec<(String, String)> {
        outcomes
            .into_iter()
            .filter(|p| !p.outcome.ok)
            .map(|p| (p.object_id, p.model))
            .collect()
    }

    async fn dispatch_task(&self, task: &Task, cancel: &CancellationToken) -> Result<(), WorkerError> {
        let pool = self.dispatcher.strategy().pool();

        let written = task.init_pending_states().await?;
        let pairs = self.pending_pairs(task).await?;
        tracing::info!(
            task_id = %task.task_id(),
            new_pending = written,
            pairs = pairs.len(),
            "Dispatching task"
        );

        pool.reap_dead(self.reap_grace).await?;
        let mut failed = Self::failed(self.dispatcher.dispatch_pairs(task, &pairs).await?);

        let mut attempt = 0;
        while !failed.is_empty() && attempt < self.max_retries {
            attempt += 1;
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.retry_interval) => {}
            }
            tracing::info!(
                task_id = %task.task_id(),
                attempt = attempt,
                pairs = failed.len(),
                "Retrying dispatch"
            );
            pool.reap_dead(self.reap_grace).await?;
            failed = Self::failed(self.dispatcher.dispatch_pairs(task, &failed).await?);
        }

        if failed.is_empty() {
            tracing::info!(task_id = %task.task_id(), "Task dispatched");
        } else {
            tracing::warn!(
                task_id = %task.task_id(),
                undispatched = ?failed,
                attempts = attempt,
                "Giving up dispatch, no resource"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl MessageHandler for DispatchHandler {
    async fn handle(
        &mut self,
        msg: &StreamMessage,
        cancel: &CancellationToken,
    ) -> Result<(), WorkerError> {
        let Some(task_id) = msg.get(TASK_ID_FIELD) else {
            tracing::warn!(message_id = %msg.id, "Message without task_id");
            return Ok(());
        };

        let Some(task) = self.task_pool.get(task_id).await? else {
            tracing::warn!(task_id = %task_id, "No such task");
            return Ok(());
        };

        match self.dispatch_task(&task, cancel).await {
            Err(WorkerError::Task(TaskError::Expired(_))) => {
                tracing::warn!(task_id = %task_id, "Task expired before dispatch");
                Ok(())
            }
            other => other,
        }
    }
}
