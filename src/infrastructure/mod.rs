//! Infrastructure Layer - 基础设施层
//!
//! 提供所有端口的具体实现以及各进程角色的入口

pub mod adapters;
pub mod http;
pub mod store;
pub mod worker;

pub use store::{connect_store, InMemoryStateStore, RedisStateStore};
pub use worker::{
    DispatcherWorker, DispatcherWorkerConfig, NotifierWorker, NotifierWorkerConfig,
    PostprocessWorker, RunnerWorker, RunnerWorkerConfig, WorkerError,
};
