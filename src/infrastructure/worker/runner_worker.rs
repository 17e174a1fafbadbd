//! Runner Worker - 单模型推理进程
//!
//! 启动：注册 → 心跳 → 加载模型 → 消费自己的命令流。
//! 每次只处理一条命令；推理 + 状态更新 + 完成通知全部结束后才 ack。
//! `stop` 命令或进程信号结束循环，退出时清除心跳并释放模型

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{consume, MessageHandler, WorkerError};
use crate::application::ports::ModelPort;
use crate::application::services::{
    HeartbeatLoop, Runner, RunnerPool, RunnerPoolError, Stream, StreamMessage, Streams, Task, TaskPool,
};
use crate::domain::runner::RunnerCommand;
use crate::domain::task::{InferenceObject, InferenceState};

/// Runner 配置
#[derive(Debug, Clone)]
pub struct RunnerWorkerConfig {
    pub name: String,
    pub model_id: String,
    pub heartbeat_ttl: Duration,
    pub heartbeat_period: Duration,
    pub block: Duration,
}

impl RunnerWorkerConfig {
    /// 固定消费者名称，重启后接管未确认命令
    pub fn consumer(&self) -> String {
        format!("{}::runner::consumer", self.name)
    }
}

pub struct RunnerWorker {
    config: RunnerWorkerConfig,
    runner_pool: RunnerPool,
    task_pool: TaskPool,
    streams: Streams,
    model: Box<dyn ModelPort>,
}

impl RunnerWorker {
    pub fn new(
        config: RunnerWorkerConfig,
        runner_pool: RunnerPool,
        task_pool: TaskPool,
        streams: Streams,
        model: Box<dyn ModelPort>,
    ) -> Self {
        Self {
            config,
            runner_pool,
            task_pool,
            streams,
            model,
        }
    }

    /// 启动 Worker，直到 stop 命令或 `cancel` 触发
    pub async fn run(self, cancel: CancellationToken) -> Result<(), WorkerError> {
        let name = self.config.name.clone();
        // 记录由调度器创建；不存在说明启动前已被删除
        let runner = self
            .runner_pool
            .get(&name)
            .await?
            .ok_or_else(|| RunnerPoolError::NotFound(name.clone()))?;

        // stop 命令只结束本 runner
        let local = cancel.child_token();
        let heartbeat_runner = self
            .runner_pool
            .get(&name)
            .await?
            .ok_or_else(|| RunnerPoolError::NotFound(name.clone()))?;
        let heartbeat = tokio::spawn(
            HeartbeatLoop::new(
                heartbeat_runner,
                self.config.heartbeat_ttl,
                self.config.heartbeat_period,
            )
            .run(local.clone()),
        );

        tracing::info!(
            runner = %name,
            model = %self.config.model_id,
            heartbeat_ttl_secs = self.config.heartbeat_ttl.as_secs(),
            heartbeat_period_secs = self.config.heartbeat_period.as_secs(),
            "RunnerWorker started"
        );

        let command_stream: Stream = self.streams.runner(&name);
        let mut handler = CommandHandler {
            runner,
            model_id: self.config.model_id.clone(),
            task_pool: self.task_pool,
            complete_stream: self.streams.task_inference_complete(),
            model: self.model,
            stopped: false,
            task_command: false,
        };

        let result = consume(
            &command_stream,
            &self.config.consumer(),
            self.config.block,
            &local,
            &mut handler,
        )
        .await;

        tracing::info!(runner = %name, "Message loop stopped, cleanup...");
        local.cancel();
        if let Err(e) = heartbeat.await {
            tracing::warn!(runner = %name, error = %e, "Heartbeat task failed");
        }
        handler.model.release().await;
        if handler.stopped {
            if let Err(e) = command_stream.destroy().await {
                tracing::warn!(runner = %name, error = %e, "Failed to remove command stream");
            }
        }

        tracing::info!(runner = %name, "RunnerWorker stopped");
        result
    }
}

/// runner 命令处理
struct CommandHandler {
    runner: Runner,
    model_id: String,
    task_pool: TaskPool,
    complete_stream: Stream,
    model: Box<dyn ModelPort>,
    /// 收到 stop 命令，记录已从注册表删除
    stopped: bool,
    /// 当前消息是任务命令；调度器派发时已在存储中置忙
    task_command: bool,
}

impl CommandHandler {
    async fn run_task(
        &mut self,
        task_id: &str,
        object_id: Option<&str>,
    ) -> Result<(), WorkerError> {
        let Some(task) = self.task_pool.get(task_id).await? else {
            tracing::warn!(task_id = %task_id, "No such task");
            return Ok(());
        };

        let objects: Vec<InferenceObject> = match object_id {
            Some(oid) => match task.get_object(oid) {
                Some(obj) => vec![obj.clone()],
                None => {
                    tracing::warn!(task_id = %task_id, object_id = %oid, "No such object in task");
                    return Ok(());
                }
            },
            // 整任务分配：处理所有需要本模型的对象
            None => task
                .object_list()
                .iter()
                .filter(|o| o.requires(&self.model_id))
                .cloned()
                .collect(),
        };

        self.runner.mark_busy(task_id, object_id, Utc::now()).await?;

        for obj in &objects {
            self.infer_object(&task, obj).await?;
        }

        self.complete_stream.publish_task_id(task_id).await?;
        tracing::info!(task_id = %task_id, objects = objects.len(), "Inference complete, notified");
        Ok(())
    }

    async fn infer_object(&self, task: &Task, obj: &InferenceObject) -> Result<(), WorkerError> {
        let model = self.model_id.as_str();
        let state = task.get_inference_state(obj, model).await?;

        // 重复投递：已完成的不再推理
        if state == InferenceState::Complete
            && task.get_inference_result(obj, model).await?.is_some()
        {
            tracing::info!(
                task_id = %task.task_id(),
                object_id = %obj.object_id,
                model = %model,
                "Inference already complete, skipping"
            );
            return Ok(());
        }

        tracing::info!(
            task_id = %task.task_id(),
            object_id = %obj.object_id,
            model = %model,
            images = ?obj.image_url_list,
            "Run inference"
        );
        task.update_inference_state(obj, model, InferenceState::Running)
            .await?;

        let result = self.model.run_inference(&obj.image_url_list, obj).await;
        tracing::debug!(
            task_id = %task.task_id(),
            object_id = %obj.object_id,
            code = %result.code,
            conf = result.conf,
            "Inference result"
        );
        if !result.is_ok() {
            tracing::warn!(
                task_id = %task.task_id(),
                object_id = %obj.object_id,
                model = %model,
                code = %result.code,
                desc = %result.desc,
                "Model returned error result"
            );
        }

        task.set_inference_result(obj, model, &result).await?;
        task.update_inference_state(obj, model, InferenceState::Complete)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl MessageHandler for CommandHandler {
    async fn handle(
        &mut self,
        msg: &StreamMessage,
        cancel: &CancellationToken,
    ) -> Result<(), WorkerError> {
        // 无法解析的命令也可能是调度器置忙后写入的
        self.task_command = true;
        let cmd = match RunnerCommand::from_fields(&msg.data) {
            Ok(cmd) => cmd,
            Err(e) => {
                tracing::warn!(message_id = %msg.id, error = %e, "Ignoring invalid command");
                return Ok(());
            }
        };

        match cmd {
            RunnerCommand::Stop => {
                self.task_command = false;
                tracing::info!(runner = %self.runner.name(), "Receive stop command, stop message loop");
                self.stopped = true;
                cancel.cancel();
                Ok(())
            }
            RunnerCommand::Task { task_id, object_id } => {
                tracing::info!(task_id = %task_id, object_id = ?object_id, "Receive task command");
                self.run_task(&task_id, object_id.as_deref()).await
            }
        }
    }

    /// ack 之后才清除忙碌标记，让调度器看到空闲
    ///
    /// 任务未找到而提前返回时本地快照仍是空闲，存储中的忙碌标记同样要清除
    async fn after_ack(&mut self) -> Result<(), WorkerError> {
        let task_command = std::mem::take(&mut self.task_command);
        if (task_command || self.runner.is_busy()) && !self.stopped {
            self.runner.mark_idle(Utc::now()).await?;
        }
        Ok(())
    }
}
