//! Task Context - Inference Results
//!
//! 单模型结果、按对象组合的结果、任务最终结果

use serde::{Deserialize, Deserializer, Serialize};

use super::value_objects::Position;

/// 结果状态码
pub mod code {
    /// 推理成功（无论是否检出目标）
    pub const OK: &str = "2000";
    /// 图片获取失败
    pub const IMAGE_FAIL: &str = "2001";
    /// 无效处理器 / 推理失败
    pub const INFER_FAIL: &str = "2002";
}

/// 单个模型的推理结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    /// 模型类型
    #[serde(rename = "type")]
    pub model_type: String,

    pub value: String,

    /// 状态码，线上格式为字符串
    #[serde(deserialize_with = "de_code")]
    pub code: String,

    #[serde(rename = "resImageUrl", default)]
    pub res_image_url: String,

    #[serde(default)]
    pub pos: Vec<Position>,

    #[serde(deserialize_with = "de_conf")]
    pub conf: f64,

    pub desc: String,
}

impl InferenceResult {
    /// 失败结果，状态码编码失败原因
    pub fn failure(model_type: impl Into<String>, code: &str, desc: impl Into<String>) -> Self {
        Self {
            model_type: model_type.into(),
            value: String::new(),
            code: code.to_string(),
            res_image_url: String::new(),
            pos: Vec::new(),
            conf: 0.0,
            desc: desc.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == code::OK
    }
}

/// 单个对象的组合结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposedResult {
    #[serde(rename = "objectId")]
    pub object_id: String,
    pub results: Vec<InferenceResult>,
}

/// 任务最终结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResults {
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(rename = "requestList")]
    pub request_list: Vec<ComposedResult>,
}

impl TaskResults {
    /// 结果总数
    pub fn result_count(&self) -> usize {
        self.request_list.iter().map(|c| c.results.len()).sum()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Str(String),
    Int(i64),
    Float(f64),
}

fn de_code<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::Str(s) => s,
        StringOrNumber::Int(i) => i.to_string(),
        StringOrNumber::Float(f) => format!("{}", f),
    })
}

fn de_conf<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::Str(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid conf {:?}: {}", s, e))),
        StringOrNumber::Int(i) => Ok(i as f64),
        StringOrNumber::Float(f) => Ok(f),
    }
}
