//! Model Engine Port - 推理模型抽象
//!
//! 具体模型（加速卡、ONNX、远程服务）在 infrastructure/adapters 层实现

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::task::{InferenceObject, InferenceResult};

/// 模型加载错误
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Unknown model: {0} (available: {1})")]
    UnknownModel(String, String),

    #[error("Failed to load model {0}: {1}")]
    LoadFailed(String, String),
}

/// Model Port
///
/// 推理失败通过结果中的状态码表达，而不是返回错误
#[async_trait]
pub trait ModelPort: Send + Sync {
    /// 执行推理
    ///
    /// `extra_args` 携带完整的推理对象，模型可从中读取区域等提示
    async fn run_inference(
        &self,
        image_urls: &[String],
        extra_args: &InferenceObject,
    ) -> InferenceResult;

    /// 释放模型资源
    async fn release(&self);
}
