//! HTTP Handlers

mod intake;
mod ping;
mod runners;
mod tasks;

pub use intake::*;
pub use ping::*;
pub use runners::*;
pub use tasks::*;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use tower::util::ServiceExt;

    use crate::application::ports::StateStorePort;
    use crate::application::services::{RunnerPool, Streams, TaskPool};
    use crate::infrastructure::adapters::launcher::NoopLauncher;
    use crate::infrastructure::http::{AppState, HttpServer};
    use crate::infrastructure::store::InMemoryStateStore;

    pub struct TestApp {
        pub task_pool: TaskPool,
        pub runner_pool: RunnerPool,
        pub streams: Streams,
        pub router: Router,
    }

    pub fn app() -> TestApp {
        let store: Arc<dyn StateStorePort> = Arc::new(InMemoryStateStore::new());
        app_with_store(store)
    }

    pub fn app_with_store(store: Arc<dyn StateStorePort>) -> TestApp {
        let task_pool = TaskPool::new(store.clone(), Duration::from_secs(600));
        let runner_pool = RunnerPool::new(store.clone(), Arc::new(NoopLauncher));
        let streams = Streams::new(store);
        let state = AppState::new(task_pool.clone(), runner_pool.clone(), &streams);
        TestApp {
            task_pool,
            runner_pool,
            streams,
            router: HttpServer::build_router(Arc::new(state)),
        }
    }

    pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    pub async fn get_json(router: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let (status, body) = send(router, request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }
}
