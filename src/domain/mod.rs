//! Domain Layer - 领域层
//!
//! 包含两个限界上下文:
//! - Task Context: 推理任务、推理状态、推理结果
//! - Runner Context: runner 记录与控制命令

pub mod runner;
pub mod task;
