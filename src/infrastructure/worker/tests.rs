//! 流水线端到端测试：入口 → dispatcher → runner → postprocess → task_finish

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::application::commands::handlers::CreateInferenceTaskHandler;
use crate::application::commands::CreateInferenceTask;
use crate::application::keys::StoreKeys;
use crate::application::ports::{StateStorePort, StoreError};
use crate::application::services::runner_pool::tests::RecordingLauncher;
use crate::application::services::{
    LruDispatchStrategy, ProcDispatcher, RunnerPool, RunnerPoolError, Streams, TaskError, TaskPool,
};
use crate::domain::task::{CreateInferenceTaskRequest, InferenceState};
use crate::infrastructure::adapters::model::FakeModel;
use crate::infrastructure::store::InMemoryStateStore;

const BLOCK: Duration = Duration::from_millis(50);

struct Pipeline {
    store: Arc<dyn StateStorePort>,
    launcher: Arc<RecordingLauncher>,
    runner_pool: RunnerPool,
    task_pool: TaskPool,
    streams: Streams,
    cancel: CancellationToken,
}

impl Pipeline {
    fn new() -> Self {
        let store: Arc<dyn StateStorePort> = Arc::new(InMemoryStateStore::new());
        let launcher = Arc::new(RecordingLauncher::default());
        Self {
            runner_pool: RunnerPool::new(store.clone(), launcher.clone()),
            task_pool: TaskPool::new(store.clone(), Duration::from_secs(600)),
            streams: Streams::new(store.clone()),
            store,
            launcher,
            cancel: CancellationToken::new(),
        }
    }

    async fn submit(&self, json: &str) {
        let request: CreateInferenceTaskRequest = serde_json::from_str(json).unwrap();
        CreateInferenceTaskHandler::new(self.task_pool.clone(), self.streams.task_create())
            .handle(CreateInferenceTask { request })
            .await
            .unwrap();
    }

    fn spawn_dispatcher(&self, max_runners: usize) -> JoinHandle<Result<(), WorkerError>> {
        let config = DispatcherWorkerConfig {
            block: BLOCK,
            max_runners,
            retry_interval: Duration::from_millis(20),
            max_retries: 0,
            ..Default::default()
        };
        let worker = DispatcherWorker::new(
            config,
            self.task_pool.clone(),
            ProcDispatcher::new(LruDispatchStrategy::new(self.runner_pool.clone())),
            self.streams.task_create(),
        );
        tokio::spawn(worker.run(self.cancel.clone()))
    }

    fn spawn_runner(&self, name: &str, model_id: &str) -> JoinHandle<Result<(), WorkerError>> {
        let config = RunnerWorkerConfig {
            name: name.to_string(),
            model_id: model_id.to_string(),
            heartbeat_ttl: Duration::from_secs(2),
            heartbeat_period: Duration::from_secs(1),
            block: BLOCK,
        };
        let worker = RunnerWorker::new(
            config,
            self.runner_pool.clone(),
            self.task_pool.clone(),
            self.streams.clone(),
            Box::new(FakeModel::new(model_id)),
        );
        tokio::spawn(worker.run(self.cancel.clone()))
    }

    fn spawn_postprocess(&self) -> JoinHandle<Result<(), WorkerError>> {
        let worker = PostprocessWorker::new(
            self.task_pool.clone(),
            self.streams.task_inference_complete(),
            self.streams.task_finish(),
            BLOCK,
        );
        tokio::spawn(worker.run(self.cancel.clone()))
    }

    /// 等待 dispatcher 启动指定数量的 runner
    async fn wait_launched(&self, n: usize) -> Vec<(String, String)> {
        for _ in 0..200 {
            let launched = self.launcher.launched.lock().unwrap().clone();
            if launched.len() >= n {
                return launched;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("runners were not launched");
    }
}

async fn wait_for<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..300 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_pipeline_composes_and_publishes_finish() {
    let p = Pipeline::new();
    p.submit(
        r#"{"requestHostIp":"10.0.0.1","requestHostPort":"8080","requestId":"T1","objectList":[
            {"objectId":"O1","typeList":["hat","intrusion"],"imageUrlList":["/cam/1.jpg"]},
            {"objectId":"O2","typeList":["hat"],"imageUrlList":["/cam/2.jpg"]}]}"#,
    )
    .await;

    let dispatcher = p.spawn_dispatcher(10);
    let launched = p.wait_launched(3).await;
    let mut runners: Vec<_> = launched
        .iter()
        .map(|(name, model)| p.spawn_runner(name, model))
        .collect();
    let postprocess = p.spawn_postprocess();

    let task_pool = p.task_pool.clone();
    wait_for(|| {
        let task_pool = task_pool.clone();
        async move {
            let task = task_pool.get("T1").await.unwrap().unwrap();
            task.get_postprocess_result().await.unwrap().is_some()
        }
    })
    .await;

    let task = p.task_pool.get("T1").await.unwrap().unwrap();
    for (obj, model) in task.raw_request().inference_pairs() {
        assert_eq!(
            task.get_inference_state(obj, model).await.unwrap(),
            InferenceState::Complete
        );
    }
    let results = task.get_postprocess_result().await.unwrap().unwrap();
    assert_eq!(results.request_id, "T1");
    assert_eq!(results.result_count(), 3);
    assert_eq!(results.request_list[0].object_id, "O1");

    let finish = p.streams.task_finish();
    let mut delivered = Vec::new();
    for _ in 0..20 {
        delivered = finish.pull("test::consumer", 10, BLOCK).await.unwrap();
        if !delivered.is_empty() {
            break;
        }
    }
    assert!(!delivered.is_empty());
    assert_eq!(delivered[0].get("task_id"), Some("T1"));

    p.cancel.cancel();
    dispatcher.await.unwrap().unwrap();
    postprocess.await.unwrap().unwrap();
    for runner in runners.drain(..) {
        runner.await.unwrap().unwrap();
    }
    // 心跳在退出时清除
    for (name, _) in &launched {
        let runner = p.runner_pool.get(name).await.unwrap().unwrap();
        assert!(!runner.is_alive().await.unwrap());
        assert!(!runner.is_busy());
    }
}

#[tokio::test]
async fn test_stop_command_ends_runner_and_removes_stream() {
    let p = Pipeline::new();
    let runner = p.runner_pool.new_runner("hat").await.unwrap();
    let name = runner.name().to_string();
    let handle = p.spawn_runner(&name, "hat");

    wait_for(|| {
        let pool = p.runner_pool.clone();
        let name = name.clone();
        async move {
            let runner = pool.get(&name).await.unwrap().unwrap();
            runner.is_alive().await.unwrap()
        }
    })
    .await;

    p.runner_pool.delete(&name).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert!(p.runner_pool.get(&name).await.unwrap().is_none());
    assert!(p
        .store
        .get(&StoreKeys::runner_heartbeat(&name))
        .await
        .unwrap()
        .is_none());
    let stream_key = StoreKeys::runner_stream(&name);
    assert!(!p.store.exists(&stream_key).await.unwrap());
}

#[tokio::test]
async fn test_runner_without_record_refuses_to_start() {
    let p = Pipeline::new();
    let err = p
        .spawn_runner("ghost", "hat")
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(
        err,
        WorkerError::Pool(RunnerPoolError::NotFound(ref name)) if name == "ghost"
    ));
}

#[tokio::test]
async fn test_unknown_task_command_is_acked_and_runner_goes_idle() {
    let p = Pipeline::new();
    let mut runner = p.runner_pool.new_runner("hat").await.unwrap();
    let name = runner.name().to_string();
    runner.run_task("missing", Some("O1")).await.unwrap();
    assert!(p.runner_pool.get(&name).await.unwrap().unwrap().is_busy());

    let handle = p.spawn_runner(&name, "hat");
    wait_for(|| {
        let pool = p.runner_pool.clone();
        let name = name.clone();
        async move { !pool.get(&name).await.unwrap().unwrap().is_busy() }
    })
    .await;

    p.cancel.cancel();
    handle.await.unwrap().unwrap();

    // 命令已确认，不会再次投递
    let stream = p.streams.runner(&name);
    let consumer = format!("{}::runner::consumer", name);
    let pending = stream.pull(&consumer, 10, BLOCK).await.unwrap();
    assert!(pending.is_empty());
}

#[tokio::test]
async fn test_idle_runner_clears_busy_after_unknown_or_invalid_command() {
    let p = Pipeline::new();
    let runner = p.runner_pool.new_runner("hat").await.unwrap();
    let name = runner.name().to_string();
    let handle = p.spawn_runner(&name, "hat");

    wait_for(|| {
        let pool = p.runner_pool.clone();
        let name = name.clone();
        async move {
            let runner = pool.get(&name).await.unwrap().unwrap();
            runner.is_alive().await.unwrap()
        }
    })
    .await;

    let is_idle = || {
        let pool = p.runner_pool.clone();
        let name = name.clone();
        async move { !pool.get(&name).await.unwrap().unwrap().is_busy() }
    };

    // 调度器派发一个不存在的任务
    let mut dispatched = p.runner_pool.get(&name).await.unwrap().unwrap();
    dispatched.run_task("missing", Some("O1")).await.unwrap();
    wait_for(&is_idle).await;

    // 置忙后收到无法解析的命令
    let mut dispatched = p.runner_pool.get(&name).await.unwrap().unwrap();
    dispatched
        .mark_busy("T9", None, chrono::Utc::now())
        .await
        .unwrap();
    p.streams
        .runner(&name)
        .publish(&[("cmd".to_string(), "bogus".to_string())])
        .await
        .unwrap();
    wait_for(&is_idle).await;

    p.cancel.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_dispatcher_gives_up_when_pool_is_full_of_busy_runners() {
    let p = Pipeline::new();
    p.runner_pool.set_max_runners(1).await.unwrap();
    let mut busy = p.runner_pool.new_runner("intrusion").await.unwrap();
    busy.run_task("other", None).await.unwrap();

    p.submit(
        r#"{"requestHostIp":"h","requestHostPort":"1","requestId":"T2","objectList":[
            {"objectId":"O1","typeList":["hat"],"imageUrlList":["/a"]}]}"#,
    )
    .await;
    let dispatcher = p.spawn_dispatcher(1);

    // pending 写入说明 dispatcher 已接手该任务
    let state_key = StoreKeys::task_inference_state("T2", "O1");
    wait_for(|| {
        let store = p.store.clone();
        let key = state_key.clone();
        async move { store.exists(&key).await.unwrap() }
    })
    .await;

    p.cancel.cancel();
    dispatcher.await.unwrap().unwrap();

    assert_eq!(p.runner_pool.count().await.unwrap(), 1);
    assert_eq!(p.launcher.launched.lock().unwrap().len(), 1);
    assert!(p.runner_pool.get(busy.name()).await.unwrap().is_some());

    let task = p.task_pool.get("T2").await.unwrap().unwrap();
    let obj = task.get_object("O1").unwrap().clone();
    assert_eq!(
        task.get_inference_state(&obj, "hat").await.unwrap(),
        InferenceState::Pending
    );
}

#[test]
fn test_transient_errors_are_connection_errors() {
    let err = WorkerError::Task(TaskError::Store(
        StoreError::Connection("refused".into()),
    ));
    assert!(err.is_transient());

    let err = WorkerError::Store(StoreError::Command("WRONGTYPE".into()));
    assert!(!err.is_transient());
    assert!(!WorkerError::Notify("503".into()).is_transient());
}

#[test]
fn test_random_consumer_format() {
    let name = random_consumer("postprocess");
    let parts: Vec<_> = name.split("::").collect();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0].len(), 8);
    assert_eq!(parts[1], "postprocess");
    assert_eq!(parts[2], "consumer");
    assert_ne!(name, random_consumer("postprocess"));
}
