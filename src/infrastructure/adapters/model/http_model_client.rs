//! HTTP Model Client - 调用外部推理服务
//!
//! 外部推理 API:
//! POST {base_url}/models/{name}/infer
//! Request: {"imageUrlList": [...], "extraArgs": {InferenceObject}}  (JSON)
//! Response: InferenceResult (JSON)
//!
//! 传输或解析失败转换为 2002 结果，不返回错误

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::application::ports::{ModelError, ModelPort};
use crate::domain::task::{code, InferenceObject, InferenceResult};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InferHttpRequest<'a> {
    image_url_list: &'a [String],
    extra_args: &'a InferenceObject,
}

/// HTTP 模型客户端配置
#[derive(Debug, Clone)]
pub struct HttpModelClientConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for HttpModelClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9000".to_string(),
            timeout_secs: 120,
        }
    }
}

pub struct HttpModelClient {
    name: String,
    client: Client,
    config: HttpModelClientConfig,
}

impl HttpModelClient {
    pub fn new(name: impl Into<String>, config: HttpModelClientConfig) -> Result<Self, ModelError> {
        let name = name.into();
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ModelError::LoadFailed(name.clone(), e.to_string()))?;

        tracing::info!(model = %name, base_url = %config.base_url, "HttpModelClient initialized");
        Ok(Self {
            name,
            client,
            config,
        })
    }

    fn infer_url(&self) -> String {
        format!(
            "{}/models/{}/infer",
            self.config.base_url.trim_end_matches('/'),
            self.name
        )
    }

    async fn call(
        &self,
        image_urls: &[String],
        extra_args: &InferenceObject,
    ) -> Result<InferenceResult, String> {
        let response = self
            .client
            .post(self.infer_url())
            .json(&InferHttpRequest {
                image_url_list: image_urls,
                extra_args,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    "inference timeout".to_string()
                } else {
                    format!("inference service unreachable: {}", e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(format!("HTTP {}: {}", status, error_text));
        }

        response
            .json::<InferenceResult>()
            .await
            .map_err(|e| format!("invalid inference response: {}", e))
    }
}

#[async_trait]
impl ModelPort for HttpModelClient {
    async fn run_inference(
        &self,
        image_urls: &[String],
        extra_args: &InferenceObject,
    ) -> InferenceResult {
        tracing::debug!(
            url = %self.infer_url(),
            object_id = %extra_args.object_id,
            images = image_urls.len(),
            "Sending inference request"
        );

        match self.call(image_urls, extra_args).await {
            Ok(result) => result,
            Err(desc) => {
                tracing::warn!(model = %self.name, object_id = %extra_args.object_id, error = %desc, "Inference failed");
                InferenceResult::failure(&self.name, code::INFER_FAIL, desc)
            }
        }
    }

    async fn release(&self) {}
}
