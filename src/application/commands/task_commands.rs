//! Task Commands - 推理任务命令

use crate::domain::task::CreateInferenceTaskRequest;

/// 创建推理任务命令
#[derive(Debug, Clone)]
pub struct CreateInferenceTask {
    pub request: CreateInferenceTaskRequest,
}

/// 创建推理任务响应
#[derive(Debug, Clone)]
pub struct CreateInferenceTaskResponse {
    pub task_id: String,
    pub callback: String,
    pub message_id: String,
}
