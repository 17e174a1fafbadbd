//! Task Context - Value Objects
//!
//! 推理请求的线上格式，字段别名与调用方保持一致

use serde::{Deserialize, Serialize};

/// 整数坐标点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: i64,
    pub y: i64,
}

impl Vector2 {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// 几何区域（有序点列表）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub areas: Vec<Vector2>,
}

/// 推理对象
///
/// 任务中的一个工作单元：一组图片 + 需要运行的模型列表 + 可选的检测区域
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceObject {
    #[serde(rename = "objectId")]
    pub object_id: String,

    /// 需要运行的模型名称
    #[serde(rename = "typeList")]
    pub type_list: Vec<String>,

    /// 图片定位符（文件服务器内路径）
    #[serde(rename = "imageUrlList")]
    pub image_url_list: Vec<String>,

    #[serde(rename = "imageNormalUrlPath", default)]
    pub image_normal_url_path: String,

    #[serde(default)]
    pub pos: Vec<Position>,
}

impl InferenceObject {
    /// 对象是否要求运行指定模型
    pub fn requires(&self, model: &str) -> bool {
        self.type_list.iter().any(|m| m == model)
    }
}

/// 创建推理任务请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateInferenceTaskRequest {
    #[serde(rename = "requestHostIp")]
    pub request_host_ip: String,

    #[serde(rename = "requestHostPort")]
    pub request_host_port: String,

    /// 调用方提供的请求 ID，作为 task id 使用
    #[serde(rename = "requestId")]
    pub request_id: String,

    #[serde(rename = "objectList")]
    pub object_list: Vec<InferenceObject>,
}

impl CreateInferenceTaskRequest {
    /// 回调地址，固定格式
    pub fn callback_url(&self) -> String {
        format!(
            "http://{}:{}/picAnalyseRetNotify",
            self.request_host_ip, self.request_host_port
        )
    }

    /// 展开所有 (object, model) 组合，保持请求中的顺序
    pub fn inference_pairs(&self) -> Vec<(&InferenceObject, &str)> {
        self.object_list
            .iter()
            .flat_map(|obj| obj.type_list.iter().map(move |m| (obj, m.as_str())))
            .collect()
    }
}
