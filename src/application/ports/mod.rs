//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod model_engine;
mod runner_launcher;
mod state_store;

pub use model_engine::{ModelError, ModelPort};
pub use runner_launcher::{LaunchError, RunnerLauncherPort};
pub use state_store::{ReadCursor, StateStorePort, StoreError, StreamEntry};
