//! Task Context - 推理任务限界上下文
//!
//! 职责:
//! - 推理请求与推理对象（线上格式）
//! - (object, model) 推理状态机
//! - 单模型结果与组合结果

mod results;
mod state;
mod value_objects;

pub use results::{code, ComposedResult, InferenceResult, TaskResults};
pub use state::InferenceState;
pub use value_objects::{CreateInferenceTaskRequest, InferenceObject, Position, Vector2};
