//! Task & Result Store - 任务与结果存储
//!
//! 任务记录、(object, model) 推理状态、推理结果、组合结果。
//! 所有派生记录共享任务的 TTL：每次写入都重新读取任务当前剩余 TTL 并应用，
//! 派生记录不会比任务记录活得更久

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::application::keys::StoreKeys;
use crate::application::ports::{StateStorePort, StoreError};
use crate::domain::task::{
    CreateInferenceTaskRequest, InferenceObject, InferenceResult, InferenceState, TaskResults,
};

/// Task 错误
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Task {task_id} has no object {object_id}")]
    ObjectNotFound { task_id: String, object_id: String },

    #[error("Object {object_id} has no such model in model list: {model}")]
    UnknownModel { object_id: String, model: String },

    #[error("Task expired: {0}")]
    Expired(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<serde_json::Error> for TaskError {
    fn from(e: serde_json::Error) -> Self {
        TaskError::Serialization(e.to_string())
    }
}

/// 任务池
#[derive(Clone)]
pub struct TaskPool {
    store: Arc<dyn StateStorePort>,
    task_ttl: Duration,
}

impl TaskPool {
    pub fn new(store: Arc<dyn StateStorePort>, task_ttl: Duration) -> Self {
        Self { store, task_ttl }
    }

    /// 创建任务，TTL 为配置的任务生命周期；相同 ID 直接覆盖
    pub async fn create(
        &self,
        task_id: &str,
        callback: &str,
        raw_request: &CreateInferenceTaskRequest,
    ) -> Result<Task, TaskError> {
        let key = StoreKeys::task(task_id);
        let raw = serde_json::to_string(raw_request)?;
        self.store
            .hset(
                &key,
                &[
                    ("task_id".to_string(), task_id.to_string()),
                    ("callback".to_string(), callback.to_string()),
                    ("raw_request".to_string(), raw),
                ],
            )
            .await?;
        self.store.expire(&key, self.task_ttl).await?;

        tracing::debug!(
            task_id = %task_id,
            ttl_secs = self.task_ttl.as_secs(),
            objects = raw_request.object_list.len(),
            "Task created"
        );

        Ok(Task {
            task_id: task_id.to_string(),
            callback: callback.to_string(),
            raw_request: raw_request.clone(),
            store: self.store.clone(),
        })
    }

    /// 获取任务，不存在时返回 None
    pub async fn get(&self, task_id: &str) -> Result<Option<Task>, TaskError> {
        let fields = self.store.hgetall(&StoreKeys::task(task_id)).await?;
        if fields.is_empty() {
            return Ok(None);
        }

        let raw = fields.get("raw_request").ok_or_else(|| {
            TaskError::Serialization(format!("task {} has no raw_request", task_id))
        })?;
        let raw_request: CreateInferenceTaskRequest = serde_json::from_str(raw)?;

        Ok(Some(Task {
            task_id: task_id.to_string(),
            callback: fields.get("callback").cloned().unwrap_or_default(),
            raw_request,
            store: self.store.clone(),
        }))
    }

    /// 删除任务及其全部派生记录
    pub async fn delete(&self, task_id: &str) -> Result<(), TaskError> {
        let mut keys = vec![
            StoreKeys::task(task_id),
            StoreKeys::postprocess_result(task_id),
        ];
        if let Some(task) = self.get(task_id).await? {
            for obj in task.object_list() {
                keys.push(StoreKeys::task_inference_state(task_id, &obj.object_id));
                keys.push(StoreKeys::task_inference_result(task_id, &obj.object_id));
            }
        }
        let removed = self.store.del(&keys).await?;
        tracing::debug!(task_id = %task_id, removed = removed, "Task deleted");
        Ok(())
    }
}

/// 任务句柄
///
/// 创建后不可变的部分（回调地址、原始请求）在获取时一次性读出
#[derive(Clone)]
pub struct Task {
    task_id: String,
    callback: String,
    raw_request: CreateInferenceTaskRequest,
    store: Arc<dyn StateStorePort>,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("task_id", &self.task_id)
            .field("callback", &self.callback)
            .finish()
    }
}

impl Task {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn callback(&self) -> &str {
        &self.callback
    }

    pub fn raw_request(&self) -> &CreateInferenceTaskRequest {
        &self.raw_request
    }

    pub fn object_list(&self) -> &[InferenceObject] {
        &self.raw_request.object_list
    }

    /// 线性查找推理对象
    pub fn get_object(&self, object_id: &str) -> Option<&InferenceObject> {
        self.object_list().iter().find(|o| o.object_id == object_id)
    }

    /// 任务剩余 TTL，任务已过期时返回 Expired
    pub async fn ttl(&self) -> Result<Duration, TaskError> {
        self.store
            .ttl(&StoreKeys::task(&self.task_id))
            .await?
            .filter(|t| !t.is_zero())
            .ok_or_else(|| TaskError::Expired(self.task_id.clone()))
    }

    fn ensure_model(&self, obj: &InferenceObject, model: &str) -> Result<(), TaskError> {
        if obj.requires(model) {
            Ok(())
        } else {
            Err(TaskError::UnknownModel {
                object_id: obj.object_id.clone(),
                model: model.to_string(),
            })
        }
    }

    async fn write_derived_hash(&self, key: &str, field: &str, value: String) -> Result<(), TaskError> {
        let ttl = self.ttl().await?;
        self.store.hset(key, &[(field.to_string(), value)]).await?;
        self.store.expire(key, ttl).await?;
        Ok(())
    }

    /// 更新推理状态（upsert），拒绝逆向迁移
    pub async fn update_inference_state(
        &self,
        obj: &InferenceObject,
        model: &str,
        state: InferenceState,
    ) -> Result<(), TaskError> {
        let current = self.get_inference_state(obj, model).await?;
        if !current.can_transition_to(state) {
            return Err(TaskError::InvalidStateTransition(format!(
                "task {} object {} model {}: {} -> {}",
                self.task_id, obj.object_id, model, current, state
            )));
        }

        let key = StoreKeys::task_inference_state(&self.task_id, &obj.object_id);
        self.write_derived_hash(&key, model, state.as_str().to_string())
            .await?;

        tracing::debug!(
            task_id = %self.task_id,
            object_id = %obj.object_id,
            model = %model,
            old_state = %current,
            new_state = %state,
            "Inference state changed"
        );
        Ok(())
    }

    /// 读取推理状态，从未写入时为 pending
    pub async fn get_inference_state(
        &self,
        obj: &InferenceObject,
        model: &str,
    ) -> Result<InferenceState, TaskError> {
        self.ensure_model(obj, model)?;
        let key = StoreKeys::task_inference_state(&self.task_id, &obj.object_id);
        match self.store.hget(&key, model).await? {
            None => Ok(InferenceState::Pending),
            Some(raw) => InferenceState::from_str(&raw).ok_or_else(|| {
                TaskError::Serialization(format!("unknown inference state {:?}", raw))
            }),
        }
    }

    /// 为所有尚无状态的 (object, model) 写入 pending
    pub async fn init_pending_states(&self) -> Result<usize, TaskError> {
        let mut written = 0;
        for (obj, model) in self.raw_request.inference_pairs() {
            let key = StoreKeys::task_inference_state(&self.task_id, &obj.object_id);
            if self.store.hget(&key, model).await?.is_none() {
                self.write_derived_hash(&key, model, InferenceState::Pending.as_str().to_string())
                    .await?;
                written += 1;
            }
        }
        Ok(written)
    }

    pub async fn set_inference_result(
        &self,
        obj: &InferenceObject,
        model: &str,
        result: &InferenceResult,
    ) -> Result<(), TaskError> {
        let key = StoreKeys::task_inference_result(&self.task_id, &obj.object_id);
        self.write_derived_hash(&key, model, serde_json::to_string(result)?)
            .await
    }

    pub async fn get_inference_result(
        &self,
        obj: &InferenceObject,
        model: &str,
    ) -> Result<Option<InferenceResult>, TaskError> {
        let key = StoreKeys::task_inference_result(&self.task_id, &obj.object_id);
        match self.store.hget(&key, model).await? {
            None => Ok(None),
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        }
    }

    pub async fn set_postprocess_result(&self, results: &TaskResults) -> Result<(), TaskError> {
        let ttl = self.ttl().await?;
        self.store
            .set(
                &StoreKeys::postprocess_result(&self.task_id),
                &serde_json::to_string(results)?,
                Some(ttl),
            )
            .await?;
        Ok(())
    }

    pub async fn get_postprocess_result(&self) -> Result<Option<TaskResults>, TaskError> {
        match self
            .store
            .get(&StoreKeys::postprocess_result(&self.task_id))
            .await?
        {
            None => Ok(None),
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        }
    }
}
