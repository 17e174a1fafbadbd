//! Infrastructure Adapters
//!
//! 六边形架构的适配器实现

pub mod launcher;
pub mod model;

pub use launcher::{NoopLauncher, ProcessLauncher};
pub use model::{FakeModel, HttpModelClient, HttpModelClientConfig, ModelRegistry};
