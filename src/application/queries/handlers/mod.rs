//! Query Handlers 实现

mod task_handlers;

pub use task_handlers::*;
