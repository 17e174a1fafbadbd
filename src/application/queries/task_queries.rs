//! Task / Runner Queries - 只读查询

/// 获取任务组合结果
#[derive(Debug, Clone)]
pub struct GetTaskResult {
    pub task_id: String,
}

/// 列出所有已注册 runner
#[derive(Debug, Clone, Default)]
pub struct ListRunners;
