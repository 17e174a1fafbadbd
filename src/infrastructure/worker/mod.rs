//! Worker Layer - 各进程角色的消息循环
//!
//! - dispatcher: task_create → runner 命令流
//! - runner: runner 命令流 → 推理 → task_inference_complete
//! - postprocess: task_inference_complete → 组合 → task_finish
//! - notifier: task_finish → HTTP 回调

mod consumer;
mod dispatcher_worker;
mod notifier_worker;
mod postprocess_worker;
mod runner_worker;

pub use consumer::{consume, MessageHandler};
pub use dispatcher_worker::{DispatcherWorker, DispatcherWorkerConfig};
pub use notifier_worker::{NotifierWorker, NotifierWorkerConfig};
pub use postprocess_worker::PostprocessWorker;
pub use runner_worker::{RunnerWorker, RunnerWorkerConfig};

use thiserror::Error;
use uuid::Uuid;

use crate::application::ports::{ModelError, StoreError};
use crate::application::services::{RunnerPoolError, TaskError};

/// Worker 错误
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Pool(#[from] RunnerPoolError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Notify failed: {0}")]
    Notify(String),
}

impl WorkerError {
    /// 存储不可达：不 ack，交由进程重启后重新投递
    pub fn is_transient(&self) -> bool {
        match self {
            WorkerError::Store(e)
            | WorkerError::Task(TaskError::Store(e))
            | WorkerError::Pool(RunnerPoolError::Store(e)) => e.is_connection(),
            _ => false,
        }
    }
}

/// 随机消费者名称: `{8 位十六进制}::{role}::consumer`
pub fn random_consumer(role: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}::{}::consumer", &id[..8], role)
}

#[cfg(test)]
mod tests;
