//! Model Adapters - 推理模型实现

mod fake_model;
mod http_model_client;
mod registry;

pub use fake_model::FakeModel;
pub use http_model_client::{HttpModelClient, HttpModelClientConfig};
pub use registry::ModelRegistry;
