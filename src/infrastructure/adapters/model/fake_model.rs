//! Fake Model - 调试模型
//!
//! 不加载任何权重，固定返回一个结果，用于联调调度链路

use async_trait::async_trait;

use crate::application::ports::ModelPort;
use crate::domain::task::{code, InferenceObject, InferenceResult};

pub struct FakeModel {
    name: String,
}

impl FakeModel {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        tracing::info!(model = %name, "FakeModel initialized");
        Self { name }
    }
}

#[async_trait]
impl ModelPort for FakeModel {
    async fn run_inference(
        &self,
        image_urls: &[String],
        extra_args: &InferenceObject,
    ) -> InferenceResult {
        tracing::debug!(
            model = %self.name,
            object_id = %extra_args.object_id,
            images = image_urls.len(),
            "FakeModel: returning fixed result"
        );
        InferenceResult {
            model_type: self.name.clone(),
            value: String::new(),
            code: code::INFER_FAIL.to_string(),
            res_image_url: String::new(),
            pos: vec![],
            conf: 0.874,
            desc: "ok".to_string(),
        }
    }

    async fn release(&self) {
        tracing::debug!(model = %self.name, "FakeModel released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_result() {
        let obj: InferenceObject = serde_json::from_str(
            r#"{"objectId":"O1","typeList":["hat"],"imageUrlList":["/a.jpg"]}"#,
        )
        .unwrap();
        let result = FakeModel::new("hat")
            .run_inference(&obj.image_url_list, &obj)
            .await;
        assert_eq!(result.model_type, "hat");
        assert_eq!(result.code, "2002");
        assert_eq!(result.conf, 0.874);
        assert_eq!(result.desc, "ok");
    }
}
