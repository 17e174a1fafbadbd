//! Task Context - Inference State

use serde::{Deserialize, Serialize};

/// 单个 (object, model) 推理状态
///
/// pending → running → complete；任何状态都可以被强制置为 failed，不可逆
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceState {
    Pending,
    Running,
    Complete,
    Failed,
}

impl InferenceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InferenceState::Pending => "pending",
            InferenceState::Running => "running",
            InferenceState::Complete => "complete",
            InferenceState::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(InferenceState::Pending),
            "running" => Some(InferenceState::Running),
            "complete" => Some(InferenceState::Complete),
            "failed" => Some(InferenceState::Failed),
            _ => None,
        }
    }

    /// 是否允许从当前状态迁移到 `next`
    pub fn can_transition_to(&self, next: InferenceState) -> bool {
        use InferenceState::*;
        match (self, next) {
            (a, b) if *a == b => true,
            (_, Failed) => true,
            (Pending, Running) | (Pending, Complete) | (Running, Complete) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for InferenceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_strings() {
        for s in [
            InferenceState::Pending,
            InferenceState::Running,
            InferenceState::Complete,
            InferenceState::Failed,
        ] {
            assert_eq!(InferenceState::from_str(s.as_str()), Some(s));
        }
        assert_eq!(InferenceState::from_str("done"), None);
    }

    #[test]
    fn test_transitions_are_forward_only() {
        use InferenceState::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Running.can_transition_to(Complete));
        assert!(Complete.can_transition_to(Failed));
        assert!(!Complete.can_transition_to(Running));
        assert!(!Running.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Complete));
    }
}
