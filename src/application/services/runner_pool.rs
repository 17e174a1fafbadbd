//! Runner Registry - runner 注册表
//!
//! 注册表是共享存储中的一个集合 + 每个 runner 一条 hash 记录。
//! 存活状态由心跳 key 派生，不写入记录本身

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::application::keys::StoreKeys;
use crate::application::ports::{LaunchError, RunnerLauncherPort, StateStorePort, StoreError};
use crate::application::services::streams::{Stream, Streams};
use crate::domain::runner::{
    generate_runner_name, RunnerCommand, RunnerError, RunnerRecord, RunnerStatus,
};

/// 注册表错误
#[derive(Debug, Error)]
pub enum RunnerPoolError {
    #[error("Runner not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// runner 注册表
#[derive(Clone)]
pub struct RunnerPool {
    store: Arc<dyn StateStorePort>,
    streams: Streams,
    launcher: Arc<dyn RunnerLauncherPort>,
}

impl RunnerPool {
    pub fn new(store: Arc<dyn StateStorePort>, launcher: Arc<dyn RunnerLauncherPort>) -> Self {
        Self {
            streams: Streams::new(store.clone()),
            store,
            launcher,
        }
    }

    /// 所有已注册 runner（不论存活），按名称排序
    pub async fn runners(&self) -> Result<Vec<Runner>, RunnerPoolError> {
        let names = self.store.smembers(&StoreKeys::runners()).await?;
        let mut runners = Vec::with_capacity(names.len());
        for name in names {
            match self.get(&name).await? {
                Some(runner) => runners.push(runner),
                None => {
                    // 集合成员没有对应记录：清理掉
                    tracing::warn!(runner = %name, "Registered runner has no record, unregistering");
                    self.store.srem(&StoreKeys::runners(), &name).await?;
                }
            }
        }
        Ok(runners)
    }

    pub async fn count(&self) -> Result<usize, RunnerPoolError> {
        Ok(self.store.smembers(&StoreKeys::runners()).await?.len())
    }

    pub async fn get(&self, name: &str) -> Result<Option<Runner>, RunnerPoolError> {
        let fields = self.store.hgetall(&StoreKeys::runner(name)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        let record = RunnerRecord::from_fields(name, &fields)?;
        Ok(Some(self.handle(record)))
    }

    fn handle(&self, record: RunnerRecord) -> Runner {
        Runner {
            stream: self.streams.runner(&record.name),
            record,
            store: self.store.clone(),
        }
    }

    async fn register(&self, record: RunnerRecord) -> Result<Runner, RunnerPoolError> {
        self.store
            .hset(&StoreKeys::runner(&record.name), &record.to_fields())
            .await?;
        self.store.sadd(&StoreKeys::runners(), &record.name).await?;
        Ok(self.handle(record))
    }

    /// 分配一个绑定 `model_id` 的新 runner，并请求启动其进程
    ///
    /// 不等待进程就绪，返回的句柄可以立即派发任务
    pub async fn new_runner(&self, model_id: &str) -> Result<Runner, RunnerPoolError> {
        let record = RunnerRecord::new(generate_runner_name(), model_id, Utc::now());
        let runner = self.register(record).await?;

        if let Err(e) = self.launcher.launch(runner.name(), model_id).await {
            // 启动失败不占用名额
            self.unregister(runner.name()).await?;
            return Err(e.into());
        }

        tracing::info!(runner = %runner.name(), model = %model_id, "Runner created");
        Ok(runner)
    }

    async fn unregister(&self, name: &str) -> Result<(), RunnerPoolError> {
        self.store.srem(&StoreKeys::runners(), name).await?;
        self.store
            .del(&[StoreKeys::runner(name), StoreKeys::runner_heartbeat(name)])
            .await?;
        Ok(())
    }

    /// 标记 runner 终止：清除注册信息并发送 stop 命令，不等待进程退出
    pub async fn delete(&self, name: &str) -> Result<(), RunnerPoolError> {
        self.unregister(name).await?;
        self.streams
            .runner(name)
            .publish(&RunnerCommand::Stop.to_fields())
            .await?;
        tracing::info!(runner = %name, "Runner deleted");
        Ok(())
    }

    /// 删除心跳已消失且超过 `grace` 未更新的 runner 及其命令流，返回被删除的名称
    pub async fn reap_dead(&self, grace: Duration) -> Result<Vec<String>, RunnerPoolError> {
        let now = Utc::now();
        let grace = chrono::Duration::from_std(grace).unwrap_or_else(|_| chrono::Duration::days(36500));
        let mut reaped = Vec::new();

        for runner in self.runners().await? {
            if now - runner.utime() <= grace || runner.is_alive().await? {
                continue;
            }
            tracing::warn!(
                runner = %runner.name(),
                model = ?runner.model_id(),
                utime = %runner.utime(),
                "Runner heartbeat lost, reaping"
            );
            // 进程已不在，没有消费者会读取 stop，直接删除命令流
            self.unregister(runner.name()).await?;
            runner.stream().destroy().await?;
            reaped.push(runner.name().to_string());
        }
        Ok(reaped)
    }

    /// 名额上限，未设置时为 0
    pub async fn max_runners(&self) -> Result<usize, RunnerPoolError> {
        let raw = self.store.get(&StoreKeys::max_runner_num()).await?;
        Ok(raw.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    pub async fn set_max_runners(&self, max: usize) -> Result<(), RunnerPoolError> {
        self.store
            .set(&StoreKeys::max_runner_num(), &max.to_string(), None)
            .await?;
        Ok(())
    }
}

/// runner 句柄
///
/// `record` 是获取时的快照；写操作同时更新快照与存储
pub struct Runner {
    record: RunnerRecord,
    store: Arc<dyn StateStorePort>,
    stream: Stream,
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner").field("record", &self.record).finish()
    }
}

impl Runner {
    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn model_id(&self) -> Option<&str> {
        self.record.model_id.as_deref()
    }

    pub fn is_busy(&self) -> bool {
        self.record.is_busy
    }

    pub fn utime(&self) -> DateTime<Utc> {
        self.record.utime
    }

    pub fn record(&self) -> &RunnerRecord {
        &self.record
    }

    /// 命令流
    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    /// 标记忙碌并向命令流发布任务分配
    pub async fn run_task(
        &mut self,
        task_id: &str,
        object_id: Option<&str>,
    ) -> Result<(), RunnerPoolError> {
        self.record.is_busy = true;
        self.record.task = Some(task_id.to_string());
        self.record.object = object_id.map(str::to_string);
        self.write_busy_fields(None).await?;

        let cmd = RunnerCommand::Task {
            task_id: task_id.to_string(),
            object_id: object_id.map(str::to_string),
        };
        self.stream.publish(&cmd.to_fields()).await?;

        tracing::debug!(
            runner = %self.record.name,
            task_id = %task_id,
            object_id = ?object_id,
            "Task assigned"
        );
        Ok(())
    }

    /// runner 侧：开始处理命令
    pub async fn mark_busy(
        &mut self,
        task_id: &str,
        object_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), RunnerPoolError> {
        self.record.is_busy = true;
        self.record.task = Some(task_id.to_string());
        self.record.object = object_id.map(str::to_string);
        self.record.utime = now;
        self.write_busy_fields(Some(now)).await
    }

    /// runner 侧：命令处理完毕
    pub async fn mark_idle(&mut self, now: DateTime<Utc>) -> Result<(), RunnerPoolError> {
        self.record.is_busy = false;
        self.record.task = None;
        self.record.object = None;
        self.record.utime = now;
        self.write_busy_fields(Some(now)).await
    }

    async fn write_busy_fields(&self, utime: Option<DateTime<Utc>>) -> Result<(), RunnerPoolError> {
        let mut fields: Vec<(String, String)> = self
            .record
            .to_fields()
            .into_iter()
            .filter(|(k, _)| matches!(k.as_str(), "is_busy" | "task" | "object"))
            .collect();
        if let Some(utime) = utime {
            fields.push(("utime".to_string(), utime.to_rfc3339()));
        }
        self.store
            .hset(&StoreKeys::runner(&self.record.name), &fields)
            .await?;
        Ok(())
    }

    /// 写入/刷新心跳
    pub async fn update_heartbeat(
        &self,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<(), RunnerPoolError> {
        self.store
            .set(
                &StoreKeys::runner_heartbeat(&self.record.name),
                &now.to_rfc3339(),
                Some(ttl),
            )
            .await?;
        Ok(())
    }

    /// 清除心跳，立即表现为死亡
    pub async fn clean_heartbeat(&self) -> Result<(), RunnerPoolError> {
        self.store
            .del(&[StoreKeys::runner_heartbeat(&self.record.name)])
            .await?;
        Ok(())
    }

    pub async fn is_alive(&self) -> Result<bool, RunnerPoolError> {
        Ok(self
            .store
            .exists(&StoreKeys::runner_heartbeat(&self.record.name))
            .await?)
    }

    /// 最新状态快照
    pub async fn status(&self) -> Result<RunnerStatus, RunnerPoolError> {
        let fields = self
            .store
            .hgetall(&StoreKeys::runner(&self.record.name))
            .await?;
        let record = if fields.is_empty() {
            self.record.clone()
        } else {
            RunnerRecord::from_fields(&self.record.name, &fields)?
        };
        Ok(RunnerStatus::new(record, self.is_alive().await?))
    }
}
