//! Runner Context - Runner 限界上下文
//!
//! 职责:
//! - runner 记录（绑定模型、忙闲、最后更新时间）
//! - runner 命令流上的控制命令

mod commands;
mod entities;
mod errors;

pub use commands::RunnerCommand;
pub use entities::{generate_runner_name, RunnerRecord, RunnerStatus};
pub use errors::RunnerError;
