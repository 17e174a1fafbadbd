//! State Store Port - 共享状态存储抽象
//!
//! 键值 / hash / set / TTL 加上带消费组语义的 append-only stream。
//! 具体实现在 infrastructure/store 层（Redis、内存）

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// 存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store connection error: {0}")]
    Connection(String),

    #[error("Store command error: {0}")]
    Command(String),

    #[error("Store decode error: {0}")]
    Decode(String),
}

impl StoreError {
    /// 是否为连接类错误（入口层据此返回 5xx）
    pub fn is_connection(&self) -> bool {
        matches!(self, StoreError::Connection(_))
    }
}

/// 消费组读取游标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadCursor {
    /// `>`: 从未投递过的新消息
    New,
    /// `0`: 本消费者已投递但未确认的消息
    Pending,
}

/// stream 中的一条消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    pub id: String,
    pub fields: HashMap<String, String>,
}

/// State Store Port
#[async_trait]
pub trait StateStorePort: Send + Sync {
    // ---------- string ----------

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    // ---------- hash ----------

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<(), StoreError>;

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;

    /// 不存在的 key 返回空 map
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    // ---------- set ----------

    async fn sadd(&self, key: &str, member: &str) -> Result<(), StoreError>;

    async fn srem(&self, key: &str, member: &str) -> Result<(), StoreError>;

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError>;

    // ---------- key ----------

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// 返回实际删除的 key 数量
    async fn del(&self, keys: &[String]) -> Result<usize, StoreError>;

    /// 设置过期时间，key 不存在时返回 false
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// 剩余存活时间，key 不存在或未设置过期时返回 None
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;

    // ---------- stream ----------

    /// 追加消息，返回消息 ID
    async fn xadd(&self, stream: &str, fields: &[(String, String)]) -> Result<String, StoreError>;

    /// 创建消费组（stream 不存在时一并创建），已存在时视为成功
    async fn xgroup_create(&self, stream: &str, group: &str) -> Result<(), StoreError>;

    /// 以消费组方式读取，`block` 为 None 时不阻塞
    async fn xreadgroup(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        cursor: ReadCursor,
        count: usize,
        block: Option<Duration>,
    ) -> Result<Vec<StreamEntry>, StoreError>;

    async fn xack(&self, stream: &str, group: &str, id: &str) -> Result<(), StoreError>;
}
