//! Post-Processing Composition - 结果组合
//!
//! 每次收到推理完成通知都重新检查；只有全部 (object, model) 都是 complete 时
//! 才读取结果、组装并写入 TaskResults。重复执行得到相同结果

use crate::application::services::task_pool::{Task, TaskError};
use crate::domain::task::{ComposedResult, InferenceState, TaskResults};

/// 尝试组合任务结果，返回是否已就绪
///
/// 未就绪不是错误：某个模型永久失败的任务会一直停留在未就绪，直到 TTL 过期
pub async fn compose_results(task: &Task) -> Result<bool, TaskError> {
    for obj in task.object_list() {
        for model in &obj.type_list {
            let state = task.get_inference_state(obj, model).await?;
            if state != InferenceState::Complete {
                tracing::debug!(
                    task_id = %task.task_id(),
                    object_id = %obj.object_id,
                    model = %model,
                    state = %state,
                    "Composition not ready"
                );
                return Ok(false);
            }
        }
    }

    let mut request_list = Vec::with_capacity(task.object_list().len());
    for obj in task.object_list() {
        let mut results = Vec::with_capacity(obj.type_list.len());
        for model in &obj.type_list {
            match task.get_inference_result(obj, model).await? {
                Some(result) => results.push(result),
                None => {
                    tracing::warn!(
                        task_id = %task.task_id(),
                        object_id = %obj.object_id,
                        model = %model,
                        "Inference complete but result missing"
                    );
                    return Ok(false);
                }
            }
        }
        request_list.push(ComposedResult {
            object_id: obj.object_id.clone(),
            results,
        });
    }

    let results = TaskResults {
        request_id: task.raw_request().request_id.clone(),
        request_list,
    };
    task.set_postprocess_result(&results).await?;

    tracing::info!(
        task_id = %task.task_id(),
        objects = results.request_list.len(),
        results = results.result_count(),
        "Task results composed"
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::dispatch::LruDispatchStrategy;
    use crate::application::services::runner_pool::tests::RecordingLauncher;
    use crate::application::services::runner_pool::RunnerPool;
    use crate::application::services::task_pool::TaskPool;
    use crate::domain::task::{code, CreateInferenceTaskRequest, InferenceResult};
    use crate::infrastructure::store::InMemoryStateStore;
    use std::sync::Arc;
    use std::time::Duration;

    fn ok_result(model: &str) -> InferenceResult {
        InferenceResult {
            model_type: model.to_string(),
            value: "1".to_string(),
            code: code::OK.to_string(),
            res_image_url: String::new(),
            pos: vec![],
            conf: 0.9,
            desc: "ok".to_string(),
        }
    }

    async fn complete(task: &Task, object_id: &str, model: &str) {
        let obj = task.get_object(object_id).unwrap().clone();
        task.update_inference_state(&obj, model, InferenceState::Running)
            .await
            .unwrap();
        task.set_inference_result(&obj, model, &ok_result(model))
            .await
            .unwrap();
        task.update_inference_state(&obj, model, InferenceState::Complete)
            .await
            .unwrap();
    }

    fn request(json: &str) -> CreateInferenceTaskRequest {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn test_two_models_one_object_scenario() {
        let store = Arc::new(InMemoryStateStore::new());
        let pool = RunnerPool::new(store.clone(), Arc::new(RecordingLauncher::default()));
        pool.set_max_runners(10).await.unwrap();
        let strategy = LruDispatchStrategy::new(pool.clone());
        let tasks = TaskPool::new(store, Duration::from_secs(600));

        let req = request(
            r#"{"requestHostIp":"h","requestHostPort":"1","requestId":"T1","objectList":[
                {"objectId":"O1","typeList":["m1","m2"],"imageUrlList":["/a"]}]}"#,
        );
        let task = tasks.create("T1", "cb", &req).await.unwrap();
        task.init_pending_states().await.unwrap();

        let r1 = strategy.dispatch("T1", Some("O1"), "m1").await.unwrap();
        assert!(r1.ok);
        assert_eq!(pool.count().await.unwrap(), 1);
        let r2 = strategy.dispatch("T1", Some("O1"), "m2").await.unwrap();
        assert!(r2.ok);
        assert_ne!(r1.runner, r2.runner);
        assert_eq!(pool.count().await.unwrap(), 2);

        complete(&task, "O1", "m1").await;
        assert!(!compose_results(&task).await.unwrap());
        assert!(task.get_postprocess_result().await.unwrap().is_none());

        complete(&task, "O1", "m2").await;
        assert!(compose_results(&task).await.unwrap());

        let results = task.get_postprocess_result().await.unwrap().unwrap();
        assert_eq!(results.request_id, "T1");
        assert_eq!(results.request_list.len(), 1);
        assert_eq!(results.request_list[0].object_id, "O1");
        assert_eq!(results.request_list[0].results.len(), 2);
    }

    #[tokio::test]
    async fn test_composition_is_idempotent() {
        let store = Arc::new(InMemoryStateStore::new());
        let tasks = TaskPool::new(store, Duration::from_secs(600));
        let req = request(
            r#"{"requestHostIp":"h","requestHostPort":"1","requestId":"T1","objectList":[
                {"objectId":"O1","typeList":["m1","m2"],"imageUrlList":["/a"]},
                {"objectId":"O2","typeList":["m3"],"imageUrlList":["/b"]}]}"#,
        );
        let task = tasks.create("T1", "cb", &req).await.unwrap();
        complete(&task, "O1", "m1").await;
        complete(&task, "O1", "m2").await;
        complete(&task, "O2", "m3").await;

        assert!(compose_results(&task).await.unwrap());
        let first = task.get_postprocess_result().await.unwrap().unwrap();
        assert_eq!(first.result_count(), 3);
        assert_eq!(first.request_list[1].results[0].model_type, "m3");

        assert!(compose_results(&task).await.unwrap());
        let second = task.get_postprocess_result().await.unwrap().unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_failed_model_blocks_composition() {
        let store = Arc::new(InMemoryStateStore::new());
        let tasks = TaskPool::new(store, Duration::from_secs(600));
        let req = request(
            r#"{"requestHostIp":"h","requestHostPort":"1","requestId":"T1","objectList":[
                {"objectId":"O1","typeList":["m1","m2"],"imageUrlList":["/a"]}]}"#,
        );
        let task = tasks.create("T1", "cb", &req).await.unwrap();
        complete(&task, "O1", "m1").await;
        let obj = task.get_object("O1").unwrap().clone();
        task.update_inference_state(&obj, "m2", InferenceState::Failed)
            .await
            .unwrap();

        assert!(!compose_results(&task).await.unwrap());
    }
}
