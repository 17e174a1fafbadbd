//! HTTP Layer - 任务入口与运维查询
//!
//! - POST /picAnalyse                 创建推理任务
//! - GET  /api/ping                   健康检查
//! - GET  /api/runners                runner 注册表快照
//! - GET  /api/tasks/:task_id/result  组合结果

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use routes::create_routes;
pub use server::HttpServer;
pub use state::AppState;
