//! gwinfer - 图像推理 runner 池调度系统
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Task Context: 推理请求、推理状态、推理结果
//! - Runner Context: runner 记录与命令
//!
//! 应用层 (application/):
//! - Ports: 端口定义（StateStore, Model, RunnerLauncher）
//! - Services: 任务存储、runner 注册表、消息流、LRU 分配、结果组合、心跳
//! - Commands / Queries: CQRS 处理器
//!
//! 基础设施层 (infrastructure/):
//! - Store: Redis / 内存共享存储
//! - Adapters: 模型后端、runner 进程启动
//! - HTTP: 任务入口
//! - Worker: dispatcher / runner / postprocess / notifier 消息循环

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
