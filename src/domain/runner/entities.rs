//! Runner Context - Entities

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use super::RunnerError;

/// 生成 runner 名称: `runner-{8 位十六进制}`
pub fn generate_runner_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("runner-{}", &id[..8])
}

/// runner 记录
///
/// 存储为 hash，空字符串表示 None
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerRecord {
    pub name: String,
    pub model_id: Option<String>,
    pub is_busy: bool,
    pub task: Option<String>,
    pub object: Option<String>,
    /// 最后更新时间，LRU 淘汰依据
    pub utime: DateTime<Utc>,
    pub ctime: DateTime<Utc>,
}

impl RunnerRecord {
    pub fn new(name: impl Into<String>, model_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            model_id: Some(model_id.into()),
            is_busy: false,
            task: None,
            object: None,
            utime: now,
            ctime: now,
        }
    }

    pub fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            ("name".to_string(), self.name.clone()),
            ("model_id".to_string(), self.model_id.clone().unwrap_or_default()),
            ("is_busy".to_string(), if self.is_busy { "1" } else { "0" }.to_string()),
            ("task".to_string(), self.task.clone().unwrap_or_default()),
            ("object".to_string(), self.object.clone().unwrap_or_default()),
            ("utime".to_string(), self.utime.to_rfc3339()),
            ("ctime".to_string(), self.ctime.to_rfc3339()),
        ]
    }

    pub fn from_fields(name: &str, fields: &HashMap<String, String>) -> Result<Self, RunnerError> {
        let invalid = |reason: String| RunnerError::InvalidRecord {
            name: name.to_string(),
            reason,
        };
        let opt = |key: &str| {
            fields
                .get(key)
                .filter(|v| !v.is_empty())
                .map(|v| v.to_string())
        };
        let time = |key: &str| -> Result<DateTime<Utc>, RunnerError> {
            let raw = fields
                .get(key)
                .ok_or_else(|| invalid(format!("missing field {}", key)))?;
            DateTime::parse_from_rfc3339(raw)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| invalid(format!("bad {} {:?}: {}", key, raw, e)))
        };

        Ok(Self {
            name: name.to_string(),
            model_id: opt("model_id"),
            is_busy: matches!(fields.get("is_busy").map(String::as_str), Some("1")),
            task: opt("task"),
            object: opt("object"),
            utime: time("utime")?,
            ctime: time("ctime")?,
        })
    }
}

/// runner 状态快照（含派生的存活状态）
#[derive(Debug, Clone, Serialize)]
pub struct RunnerStatus {
    pub name: String,
    pub model_id: Option<String>,
    pub is_busy: bool,
    pub task: Option<String>,
    pub object: Option<String>,
    pub utime: DateTime<Utc>,
    pub alive: bool,
}

impl RunnerStatus {
    pub fn new(record: RunnerRecord, alive: bool) -> Self {
        Self {
            name: record.name,
            model_id: record.model_id,
            is_busy: record.is_busy,
            task: record.task,
            object: record.object,
            utime: record.utime,
            alive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runner_name_shape() {
        let name = generate_runner_name();
        assert!(name.starts_with("runner-"));
        assert_eq!(name.len(), "runner-".len() + 8);
        assert_ne!(name, generate_runner_name());
    }

    #[test]
    fn test_record_fields_round_trip() {
        let mut record = RunnerRecord::new("runner-a", "hat", Utc::now());
        record.is_busy = true;
        record.task = Some("T1".to_string());

        let fields: HashMap<String, String> = record.to_fields().into_iter().collect();
        assert_eq!(fields["object"], "");

        let parsed = RunnerRecord::from_fields("runner-a", &fields).unwrap();
        assert_eq!(parsed.model_id.as_deref(), Some("hat"));
        assert!(parsed.is_busy);
        assert_eq!(parsed.task.as_deref(), Some("T1"));
        assert_eq!(parsed.object, None);
        assert_eq!(parsed.utime.timestamp_micros(), record.utime.timestamp_micros());
    }

    #[test]
    fn test_record_missing_utime_is_invalid() {
        let fields: HashMap<String, String> =
            [("model_id".to_string(), "hat".to_string())].into_iter().collect();
        assert!(matches!(
            RunnerRecord::from_fields("runner-a", &fields),
            Err(RunnerError::InvalidRecord { .. })
        ));
    }
}
