//! Runner Context - Commands
//!
//! runner 命令流上的消息: `task`（分配推理）与 `stop`（退出）
//!
//! `task` 不带 `oid` 时表示整任务分配：runner 处理任务中所有需要其模型的对象

use std::collections::HashMap;

use super::RunnerError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerCommand {
    Task {
        task_id: String,
        object_id: Option<String>,
    },
    Stop,
}

impl RunnerCommand {
    pub fn tag(&self) -> &'static str {
        match self {
            RunnerCommand::Task { .. } => "task",
            RunnerCommand::Stop => "stop",
        }
    }

    pub fn to_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![("cmd".to_string(), self.tag().to_string())];
        if let RunnerCommand::Task { task_id, object_id } = self {
            fields.push(("tid".to_string(), task_id.clone()));
            if let Some(object_id) = object_id {
                fields.push(("oid".to_string(), object_id.clone()));
            }
        }
        fields
    }

    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self, RunnerError> {
        let cmd = fields
            .get("cmd")
            .ok_or_else(|| RunnerError::InvalidCommand("missing cmd".to_string()))?;
        match cmd.as_str() {
            "task" => {
                let task_id = fields
                    .get("tid")
                    .filter(|v| !v.is_empty())
                    .cloned()
                    .ok_or_else(|| RunnerError::InvalidCommand("task without tid".to_string()))?;
                Ok(RunnerCommand::Task {
                    task_id,
                    object_id: fields.get("oid").filter(|v| !v.is_empty()).cloned(),
                })
            }
            "stop" => Ok(RunnerCommand::Stop),
            other => Err(RunnerError::InvalidCommand(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_map(fields: Vec<(String, String)>) -> HashMap<String, String> {
        fields.into_iter().collect()
    }

    #[test]
    fn test_task_command_fields() {
        let cmd = RunnerCommand::Task {
            task_id: "T1".to_string(),
            object_id: Some("O1".to_string()),
        };
        let fields = to_map(cmd.to_fields());
        assert_eq!(fields["cmd"], "task");
        assert_eq!(fields["tid"], "T1");
        assert_eq!(fields["oid"], "O1");
        assert_eq!(RunnerCommand::from_fields(&fields).unwrap(), cmd);
    }

    #[test]
    fn test_stop_and_invalid_commands() {
        let stop = to_map(RunnerCommand::Stop.to_fields());
        assert_eq!(stop.len(), 1);
        assert_eq!(RunnerCommand::from_fields(&stop).unwrap(), RunnerCommand::Stop);

        let unknown = to_map(vec![("cmd".to_string(), "pause".to_string())]);
        assert!(RunnerCommand::from_fields(&unknown).is_err());

        let no_tid = to_map(vec![
            ("cmd".to_string(), "task".to_string()),
            ("oid".to_string(), "O1".to_string()),
        ]);
        assert!(RunnerCommand::from_fields(&no_tid).is_err());

        let whole_task = to_map(vec![
            ("cmd".to_string(), "task".to_string()),
            ("tid".to_string(), "T1".to_string()),
        ]);
        assert_eq!(
            RunnerCommand::from_fields(&whole_task).unwrap(),
            RunnerCommand::Task {
                task_id: "T1".to_string(),
                object_id: None,
            }
        );
    }
}
