//! Runner Launcher Port - runner 进程启动
//!
//! 进程监管不属于调度核心，这里只约定"请求启动一个 runner"这一副作用

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("failed to launch runner {name} for model {model_id}: {reason}")]
pub struct LaunchError {
    pub name: String,
    pub model_id: String,
    pub reason: String,
}

/// Runner Launcher Port
///
/// `launch` 不等待进程就绪；调度方可以立即向新 runner 的命令流派发任务，
/// 消息会排队直到 runner 启动
#[async_trait]
pub trait RunnerLauncherPort: Send + Sync {
    async fn launch(&self, name: &str, model_id: &str) -> Result<(), LaunchError>;
}
