//! Message Streams - 基于消费组的消息流
//!
//! 四条逻辑流：
//! - task_create: 入口 → 调度器
//! - runner:{name}: 调度器 → runner（task / stop 命令）
//! - task_inference_complete: runner → 后处理
//! - task_finish: 后处理 → 回调通知
//!
//! 至少一次投递：消息处理完成后显式 ack，未 ack 的消息在同名消费者重启后重新投递

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::application::keys::StoreKeys;
use crate::application::ports::{ReadCursor, StateStorePort, StoreError};

/// 流水线消息中的任务 ID 字段
pub const TASK_ID_FIELD: &str = "task_id";

/// 一条已投递的消息
pub struct StreamMessage {
    pub id: String,
    pub data: HashMap<String, String>,
    store: Arc<dyn StateStorePort>,
    stream: String,
    group: String,
}

impl StreamMessage {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.data.get(field).map(String::as_str)
    }

    /// 确认消息已处理完毕
    pub async fn ack(&self) -> Result<(), StoreError> {
        self.store.xack(&self.stream, &self.group, &self.id).await?;
        tracing::debug!(stream = %self.stream, message_id = %self.id, "Message acked");
        Ok(())
    }
}

impl std::fmt::Debug for StreamMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamMessage")
            .field("id", &self.id)
            .field("data", &self.data)
            .field("stream", &self.stream)
            .finish()
    }
}

/// 单条消息流及其消费组
pub struct Stream {
    store: Arc<dyn StateStorePort>,
    stream: String,
    group: String,
    group_ready: AtomicBool,
}

impl Stream {
    pub fn new(store: Arc<dyn StateStorePort>, stream: String, group: impl Into<String>) -> Self {
        Self {
            store,
            stream,
            group: group.into(),
            group_ready: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.stream
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// 发布一条消息，返回消息 ID
    pub async fn publish(&self, fields: &[(String, String)]) -> Result<String, StoreError> {
        let id = self.store.xadd(&self.stream, fields).await?;
        tracing::debug!(stream = %self.stream, message_id = %id, "Message published");
        Ok(id)
    }

    /// 发布 `{task_id}` 通知
    pub async fn publish_task_id(&self, task_id: &str) -> Result<String, StoreError> {
        self.publish(&[(TASK_ID_FIELD.to_string(), task_id.to_string())])
            .await
    }

    /// 拉取消息
    ///
    /// 先返回本消费者未确认的历史消息，没有时再阻塞读取新消息，
    /// 阻塞至多 `block`（返回空列表表示超时）
    pub async fn pull(
        &self,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamMessage>, StoreError> {
        self.ensure_group().await?;

        let mut entries = self
            .store
            .xreadgroup(&self.stream, &self.group, consumer, ReadCursor::Pending, count, None)
            .await?;
        if !entries.is_empty() {
            tracing::info!(
                stream = %self.stream,
                consumer = %consumer,
                count = entries.len(),
                "Redelivering unacknowledged messages"
            );
        } else {
            entries = self
                .store
                .xreadgroup(
                    &self.stream,
                    &self.group,
                    consumer,
                    ReadCursor::New,
                    count,
                    Some(block),
                )
                .await?;
        }

        Ok(entries
            .into_iter()
            .map(|e| StreamMessage {
                id: e.id,
                data: e.fields,
                store: self.store.clone(),
                stream: self.stream.clone(),
                group: self.group.clone(),
            })
            .collect())
    }

    /// 删除整条流（runner 退出后清理其命令流）
    pub async fn destroy(&self) -> Result<(), StoreError> {
        self.store.del(&[self.stream.clone()]).await?;
        self.group_ready.store(false, Ordering::Release);
        Ok(())
    }

    async fn ensure_group(&self) -> Result<(), StoreError> {
        if self.group_ready.load(Ordering::Acquire) {
            return Ok(());
        }
        self.store.xgroup_create(&self.stream, &self.group).await?;
        self.group_ready.store(true, Ordering::Release);
        Ok(())
    }
}

/// 消息流工厂
#[derive(Clone)]
pub struct Streams {
    store: Arc<dyn StateStorePort>,
}

impl Streams {
    pub fn new(store: Arc<dyn StateStorePort>) -> Self {
        Self { store }
    }

    pub fn task_create(&self) -> Stream {
        Stream::new(self.store.clone(), StoreKeys::task_create_stream(), "dispatcher")
    }

    pub fn runner(&self, name: &str) -> Stream {
        Stream::new(self.store.clone(), StoreKeys::runner_stream(name), "runner")
    }

    pub fn task_inference_complete(&self) -> Stream {
        Stream::new(
            self.store.clone(),
            StoreKeys::task_inference_complete_stream(),
            "postprocess",
        )
    }

    pub fn task_finish(&self) -> Stream {
        Stream::new(self.store.clone(), StoreKeys::task_finish_stream(), "notifier")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::store::InMemoryStateStore;

    #[tokio::test]
    async fn test_publish_before_consumer_is_delivered() {
        let store: Arc<dyn StateStorePort> = Arc::new(InMemoryStateStore::new());
        let streams = Streams::new(store);
        let stream = streams.task_inference_complete();

        stream.publish_task_id("T1").await.unwrap();

        let msgs = stream
            .pull("pp-1", 1, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].get(TASK_ID_FIELD), Some("T1"));
    }

    #[tokio::test]
    async fn test_unacked_message_is_redelivered_to_same_consumer() {
        let store: Arc<dyn StateStorePort> = Arc::new(InMemoryStateStore::new());
        let stream = Streams::new(store.clone()).runner("runner-a");
        stream
            .publish(&[("cmd".to_string(), "stop".to_string())])
            .await
            .unwrap();

        let first = stream.pull("c", 1, Duration::from_millis(10)).await.unwrap();
        assert_eq!(first.len(), 1);

        // 模拟崩溃后重启：新的 Stream 句柄，同一消费者名
        let restarted = Streams::new(store).runner("runner-a");
        let again = restarted.pull("c", 1, Duration::from_millis(10)).await.unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].id, first[0].id);

        again[0].ack().await.unwrap();
        let empty = restarted.pull("c", 1, Duration::from_millis(10)).await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_group_members_share_entries() {
        let store: Arc<dyn StateStorePort> = Arc::new(InMemoryStateStore::new());
        let stream = Streams::new(store).task_inference_complete();
        stream.publish_task_id("T1").await.unwrap();
        stream.publish_task_id("T2").await.unwrap();

        let a = stream.pull("a", 1, Duration::from_millis(10)).await.unwrap();
        a[0].ack().await.unwrap();
        let b = stream.pull("b", 1, Duration::from_millis(10)).await.unwrap();

        assert_eq!(a[0].get(TASK_ID_FIELD), Some("T1"));
        assert_eq!(b[0].get(TASK_ID_FIELD), Some("T2"));
    }
}
