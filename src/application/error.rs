//! 应用层错误定义
//!
//! 统一的命令/查询错误类型

use thiserror::Error;

use crate::application::ports::StoreError;
use crate::application::services::{RunnerPoolError, TaskError};

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 资源未找到
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// 验证错误
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 共享存储不可达
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// 存储错误
    #[error("Storage error: {0}")]
    StorageError(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApplicationError {
    pub fn not_found(resource_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type,
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }
}

impl From<StoreError> for ApplicationError {
    fn from(err: StoreError) -> Self {
        if err.is_connection() {
            ApplicationError::StoreUnavailable(err.to_string())
        } else {
            ApplicationError::StorageError(err.to_string())
        }
    }
}

impl From<TaskError> for ApplicationError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::Store(e) => e.into(),
            TaskError::NotFound(id) | TaskError::Expired(id) => Self::not_found("Task", id),
            TaskError::ObjectNotFound { object_id, .. } => Self::not_found("Object", object_id),
            TaskError::UnknownModel { .. } | TaskError::InvalidStateTransition(_) => {
                Self::ValidationError(err.to_string())
            }
            TaskError::Serialization(msg) => Self::InternalError(msg),
        }
    }
}

impl From<RunnerPoolError> for ApplicationError {
    fn from(err: RunnerPoolError) -> Self {
        match err {
            RunnerPoolError::Store(e) => e.into(),
            RunnerPoolError::NotFound(name) => Self::not_found("Runner", name),
            other => Self::InternalError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_by_kind() {
        let err: ApplicationError = StoreError::Connection("refused".into()).into();
        assert!(matches!(err, ApplicationError::StoreUnavailable(_)));

        let err: ApplicationError = TaskError::Store(StoreError::Command("WRONGTYPE".into())).into();
        assert!(matches!(err, ApplicationError::StorageError(_)));
    }

    #[test]
    fn test_task_not_found_maps_to_not_found() {
        let err: ApplicationError = TaskError::NotFound("T1".into()).into();
        assert_eq!(err.to_string(), "Task not found: T1");
    }
}
