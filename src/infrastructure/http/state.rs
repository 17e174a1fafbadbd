//! Application State
//!
//! HTTP 层持有的命令/查询处理器

use crate::application::services::{RunnerPool, Streams, TaskPool};
use crate::application::{CreateInferenceTaskHandler, GetTaskResultHandler, ListRunnersHandler};

pub struct AppState {
    pub create_task_handler: CreateInferenceTaskHandler,
    pub get_task_result_handler: GetTaskResultHandler,
    pub list_runners_handler: ListRunnersHandler,
}

impl AppState {
    pub fn new(task_pool: TaskPool, runner_pool: RunnerPool, streams: &Streams) -> Self {
        Self {
            create_task_handler: CreateInferenceTaskHandler::new(
                task_pool.clone(),
                streams.task_create(),
            ),
            get_task_result_handler: GetTaskResultHandler::new(task_pool),
            list_runners_handler: ListRunnersHandler::new(runner_pool),
        }
    }
}
