//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（StateStore、Model、RunnerLauncher）
//! - services: 调度核心（任务存储、runner 注册表、消息流、分配、组合、心跳）
//! - commands: CQRS 命令及处理器
//! - queries: CQRS 查询及处理器
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod keys;
pub mod ports;
pub mod queries;
pub mod services;

pub use commands::{
    handlers::CreateInferenceTaskHandler, CreateInferenceTask, CreateInferenceTaskResponse,
};

pub use error::ApplicationError;

pub use ports::{
    LaunchError, ModelError, ModelPort, ReadCursor, RunnerLauncherPort, StateStorePort,
    StoreError, StreamEntry,
};

pub use queries::{
    handlers::{GetTaskResultHandler, ListRunnersHandler, RunnerListResponse},
    GetTaskResult, ListRunners,
};

pub use services::{
    compose_results, DispatchOutcome, LruDispatchStrategy, ProcDispatcher, Runner, RunnerPool,
    RunnerPoolError, Stream, Streams, Task, TaskError, TaskPool,
};
