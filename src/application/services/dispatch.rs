//! Dispatch Engine - runner 分配
//!
//! 每个 (object, model) 需求执行一次：
//! 1. 复用绑定同一模型的空闲 runner
//! 2. 未达名额上限时新建 runner
//! 3. 否则淘汰 utime 最早的空闲 runner（任意模型）并新建；没有空闲 runner 时失败
//!
//! 忙碌 runner 永远不会被抢占。扫描与动作之间没有分布式锁，
//! 部署上只运行一个调度器进程

use serde::Serialize;

use crate::application::services::runner_pool::{RunnerPool, RunnerPoolError};
use crate::application::services::task_pool::Task;

/// 资源耗尽时的失败原因
pub const NO_RESOURCE: &str = "too busy, no resource for new runner";

/// 分配结果
///
/// 资源耗尽是预期内的结果而不是错误，由调用方决定是否重试
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub ok: bool,
    pub reason: Option<String>,
    pub runner: Option<String>,
}

impl DispatchOutcome {
    pub fn success(runner: impl Into<String>) -> Self {
        Self {
            ok: true,
            reason: None,
            runner: Some(runner.into()),
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
            runner: None,
        }
    }
}

/// LRU 分配策略
#[derive(Clone)]
pub struct LruDispatchStrategy {
    pool: RunnerPool,
}

impl LruDispatchStrategy {
    pub fn new(pool: RunnerPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &RunnerPool {
        &self.pool
    }

    /// 为一个模型需求分配 runner 并派发任务
    pub async fn dispatch(
        &self,
        task_id: &str,
        object_id: Option<&str>,
        model: &str,
    ) -> Result<DispatchOutcome, RunnerPoolError> {
        let mut runners = self.pool.runners().await?;

        // 1. 复用
        if let Some(pos) = runners
            .iter()
            .position(|r| !r.is_busy() && r.model_id() == Some(model))
        {
            let mut runner = runners.swap_remove(pos);
            runner.run_task(task_id, object_id).await?;
            tracing::debug!(runner = %runner.name(), model = %model, "Reusing idle runner");
            return Ok(DispatchOutcome::success(runner.name()));
        }

        // 2. 扩容
        let max = self.pool.max_runners().await?;
        if runners.len() < max {
            return self.spawn(task_id, object_id, model).await;
        }

        // 3. 淘汰最久未使用的空闲 runner；min_by_key 在相等时取第一个
        let victim = runners
            .iter()
            .filter(|r| !r.is_busy())
            .min_by_key(|r| r.utime());
        match victim {
            None => {
                tracing::warn!(
                    task_id = %task_id,
                    model = %model,
                    runners = runners.len(),
                    max_runners = max,
                    "No idle runner to evict"
                );
                Ok(DispatchOutcome::failure(NO_RESOURCE))
            }
            Some(victim) => {
                tracing::info!(
                    runner = %victim.name(),
                    victim_model = ?victim.model_id(),
                    model = %model,
                    utime = %victim.utime(),
                    "Evicting least recently used runner"
                );
                self.pool.delete(victim.name()).await?;
                self.spawn(task_id, object_id, model).await
            }
        }
    }

    async fn spawn(
        &self,
        task_id: &str,
        object_id: Option<&str>,
        model: &str,
    ) -> Result<DispatchOutcome, RunnerPoolError> {
        let mut runner = self.pool.new_runner(model).await?;
        runner.run_task(task_id, object_id).await?;
        Ok(DispatchOutcome::success(runner.name()))
    }
}

/// 单个 (object, model) 的分配结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairOutcome {
    pub object_id: String,
    pub model: String,
    pub outcome: DispatchOutcome,
}

/// 按对象按模型分配
///
/// 顺序逐对分配，部分失败不回滚
#[derive(Clone)]
pub struct ProcDispatcher {
    strategy: LruDispatchStrategy,
}

impl ProcDispatcher {
    pub fn new(strategy: LruDispatchStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> &LruDispatchStrategy {
        &self.strategy
    }

    pub async fn dispatch(&self, task: &Task) -> Result<Vec<PairOutcome>, RunnerPoolError> {
        let pairs: Vec<(String, String)> = task
            .raw_request()
            .inference_pairs()
            .into_iter()
            .map(|(obj, model)| (obj.object_id.clone(), model.to_string()))
            .collect();
        self.dispatch_pairs(task, &pairs).await
    }

    /// 只分配指定的 (object_id, model)，用于重试失败项
    pub async fn dispatch_pairs(
        &self,
        task: &Task,
        pairs: &[(String, String)],
    ) -> Result<Vec<PairOutcome>, RunnerPoolError> {
        let mut outcomes = Vec::with_capacity(pairs.len());
        for (object_id, model) in pairs {
            let outcome = self
                .strategy
                .dispatch(task.task_id(), Some(object_id), model)
                .await?;
            tracing::debug!(
                task_id = %task.task_id(),
                object_id = %object_id,
                model = %model,
                ok = outcome.ok,
                runner = ?outcome.runner,
                "Pair dispatched"
            );
            outcomes.push(PairOutcome {
                object_id: object_id.clone(),
                model: model.clone(),
                outcome,
            });
        }
        Ok(outcomes)
    }
}

/// 整任务分配：一个任务一个 runner，适用于任务与模型一一对应的场景
#[derive(Clone)]
pub struct ModuleDispatcher {
    strategy: LruDispatchStrategy,
}

impl ModuleDispatcher {
    pub fn new(strategy: LruDispatchStrategy) -> Self {
        Self { strategy }
    }

    pub async fn dispatch(&self, task: &Task, model: &str) -> Result<DispatchOutcome, RunnerPoolError> {
        self.strategy.dispatch(task.task_id(), None, model).await
    }
}
