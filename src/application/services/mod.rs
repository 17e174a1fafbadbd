//! 应用服务 - 调度核心
//!
//! - task_pool: 任务与结果存储
//! - runner_pool: runner 注册表
//! - streams: 消息流协议
//! - dispatch: LRU 分配
//! - compose: 结果组合
//! - heartbeat: 存活心跳

pub mod compose;
pub mod dispatch;
pub mod heartbeat;
pub mod runner_pool;
pub mod streams;
pub mod task_pool;

pub use compose::compose_results;
pub use dispatch::{
    DispatchOutcome, LruDispatchStrategy, ModuleDispatcher, PairOutcome, ProcDispatcher,
    NO_RESOURCE,
};
pub use heartbeat::HeartbeatLoop;
pub use runner_pool::{Runner, RunnerPool, RunnerPoolError};
pub use streams::{Stream, StreamMessage, Streams, TASK_ID_FIELD};
pub use task_pool::{Task, TaskError, TaskPool};
