//! 共享存储 key 布局

/// 所有 key 的统一前缀
const PREFIX: &str = "gw";

pub struct StoreKeys;

impl StoreKeys {
    pub fn task(task_id: &str) -> String {
        format!("{}:task:{}", PREFIX, task_id)
    }

    pub fn task_inference_state(task_id: &str, object_id: &str) -> String {
        format!("{}:task:{}:state:{}", PREFIX, task_id, object_id)
    }

    pub fn task_inference_result(task_id: &str, object_id: &str) -> String {
        format!("{}:task:{}:result:{}", PREFIX, task_id, object_id)
    }

    pub fn postprocess_result(task_id: &str) -> String {
        format!("{}:task:{}:postprocess", PREFIX, task_id)
    }

    pub fn max_runner_num() -> String {
        format!("{}:runner:max_num", PREFIX)
    }

    pub fn runners() -> String {
        format!("{}:runners", PREFIX)
    }

    pub fn runner(name: &str) -> String {
        format!("{}:runner:{}", PREFIX, name)
    }

    pub fn runner_heartbeat(name: &str) -> String {
        format!("{}:runner:{}:heartbeat", PREFIX, name)
    }

    pub fn task_create_stream() -> String {
        format!("{}:stream:task_create", PREFIX)
    }

    pub fn runner_stream(name: &str) -> String {
        format!("{}:stream:runner:{}", PREFIX, name)
    }

    pub fn task_inference_complete_stream() -> String {
        format!("{}:stream:task_inference_complete", PREFIX)
    }

    pub fn task_finish_stream() -> String {
        format!("{}:stream:task_finish", PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_keys_share_prefix() {
        let task = StoreKeys::task("T1");
        assert_eq!(task, "gw:task:T1");
        assert!(StoreKeys::task_inference_state("T1", "O1").starts_with(&task));
        assert!(StoreKeys::task_inference_result("T1", "O1").starts_with(&task));
        assert!(StoreKeys::postprocess_result("T1").starts_with(&task));
    }

    #[test]
    fn test_runner_keys() {
        assert_eq!(StoreKeys::runner("r1"), "gw:runner:r1");
        assert_eq!(StoreKeys::runner_heartbeat("r1"), "gw:runner:r1:heartbeat");
        assert_eq!(StoreKeys::runner_stream("r1"), "gw:stream:runner:r1");
    }
}
