//! Redis State Store Implementation
//!
//! 普通命令走 ConnectionManager（自动重连、多路复用）；
//! 阻塞的 XREADGROUP 使用独立连接，避免阻塞期间卡住心跳等其他写入

use async_trait::async_trait;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::streams::StreamReadReply;
use redis::{Client, RedisError};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::application::ports::{ReadCursor, StateStorePort, StoreError, StreamEntry};

/// Redis 连接配置
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    pub host: String,
    pub port: u16,
    pub db: i64,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            db: 0,
        }
    }
}

impl RedisStoreConfig {
    pub fn url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }
}

fn map_err(e: RedisError) -> StoreError {
    if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout()
    {
        StoreError::Connection(e.to_string())
    } else {
        StoreError::Command(e.to_string())
    }
}

fn millis(d: Duration) -> u64 {
    (d.as_millis() as u64).max(1)
}

/// Redis 状态存储
pub struct RedisStateStore {
    client: Client,
    manager: ConnectionManager,
    blocking: Mutex<Option<MultiplexedConnection>>,
}

impl RedisStateStore {
    /// 连接 Redis
    pub async fn connect(config: &RedisStoreConfig) -> Result<Self, StoreError> {
        let client = Client::open(config.url()).map_err(map_err)?;
        let manager = ConnectionManager::new(client.clone()).await.map_err(map_err)?;

        tracing::info!(
            host = %config.host,
            port = config.port,
            db = config.db,
            "Connected to redis"
        );

        Ok(Self {
            client,
            manager,
            blocking: Mutex::new(None),
        })
    }

    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

#[async_trait]
impl StateStorePort for RedisStateStore {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(millis(ttl));
        }
        cmd.query_async::<_, ()>(&mut self.conn()).await.map_err(map_err)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut self.conn())
            .await
            .map_err(map_err)
    }

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<(), StoreError> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key);
        for (k, v) in fields {
            cmd.arg(k).arg(v);
        }
        cmd.query_async::<_, ()>(&mut self.conn()).await.map_err(map_err)
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        redis::cmd("HGET")
            .arg(key)
            .arg(field)
            .query_async(&mut self.conn())
            .await
            .map_err(map_err)
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        redis::cmd("HGETALL")
            .arg(key)
            .query_async(&mut self.conn())
            .await
            .map_err(map_err)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<(), StoreError> {
        redis::cmd("SADD")
            .arg(key)
            .arg(member)
            .query_async::<_, ()>(&mut self.conn())
            .await
            .map_err(map_err)
    }

    async fn srem(&self, key: &str, member: &str) -> Result<(), StoreError> {
        redis::cmd("SREM")
            .arg(key)
            .arg(member)
            .query_async::<_, ()>(&mut self.conn())
            .await
            .map_err(map_err)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut members: Vec<String> = redis::cmd("SMEMBERS")
            .arg(key)
            .query_async(&mut self.conn())
            .await
            .map_err(map_err)?;
        // SMEMBERS 无序，排序后保证枚举顺序确定
        members.sort();
        Ok(members)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let n: i64 = redis::cmd("EXISTS")
            .arg(key)
            .query_async(&mut self.conn())
            .await
            .map_err(map_err)?;
        Ok(n == 1)
    }

    async fn del(&self, keys: &[String]) -> Result<usize, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        redis::cmd("DEL")
            .arg(keys)
            .query_async(&mut self.conn())
            .await
            .map_err(map_err)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let n: i64 = redis::cmd("PEXPIRE")
            .arg(key)
            .arg(millis(ttl))
            .query_async(&mut self.conn())
            .await
            .map_err(map_err)?;
        Ok(n == 1)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        // -2: key 不存在, -1: 无过期时间
        let ms: i64 = redis::cmd("PTTL")
            .arg(key)
            .query_async(&mut self.conn())
            .await
            .map_err(map_err)?;
        Ok((ms >= 0).then(|| Duration::from_millis(ms as u64)))
    }

    async fn xadd(&self, stream: &str, fields: &[(String, String)]) -> Result<String, StoreError> {
        let mut cmd = redis::cmd("XADD");
        cmd.arg(stream).arg("*");
        for (k, v) in fields {
            cmd.arg(k).arg(v);
        }
        cmd.query_async(&mut self.conn()).await.map_err(map_err)
    }

    async fn xgroup_create(&self, stream: &str, group: &str) -> Result<(), StoreError> {
        let result: Result<(), RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(stream)
            .arg(group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut self.conn())
            .await;
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(map_err(e)),
        }
    }

    async fn xreadgroup(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        cursor: ReadCursor,
        count: usize,
        block: Option<Duration>,
    ) -> Result<Vec<StreamEntry>, StoreError> {
        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP").arg(group).arg(consumer).arg("COUNT").arg(count);
        if let Some(block) = block {
            cmd.arg("BLOCK").arg(millis(block));
        }
        let id = match cursor {
            ReadCursor::New => ">",
            ReadCursor::Pending => "0",
        };
        cmd.arg("STREAMS").arg(stream).arg(id);

        let reply: Option<StreamReadReply> = if block.is_some() {
            let mut guard = self.blocking.lock().await;
            if guard.is_none() {
                let conn = self
                    .client
                    .get_multiplexed_async_connection()
                    .await
                    .map_err(map_err)?;
                *guard = Some(conn);
            }
            let conn = guard
                .as_mut()
                .ok_or_else(|| StoreError::Connection("blocking connection unavailable".into()))?;
            match cmd.query_async(conn).await {
                Ok(reply) => reply,
                Err(e) => {
                    // 丢弃可能已损坏的连接，下次重建
                    *guard = None;
                    return Err(map_err(e));
                }
            }
        } else {
            cmd.query_async(&mut self.conn()).await.map_err(map_err)?
        };

        let mut out = Vec::new();
        for key in reply.map(|r| r.keys).unwrap_or_default() {
            for sid in key.ids {
                let mut fields = HashMap::with_capacity(sid.map.len());
                for (k, v) in sid.map {
                    let v: String = redis::from_redis_value(&v)
                        .map_err(|e| StoreError::Decode(format!("{}: {}", k, e)))?;
                    fields.insert(k, v);
                }
                out.push(StreamEntry { id: sid.id, fields });
            }
        }
        Ok(out)
    }

    async fn xack(&self, stream: &str, group: &str, id: &str) -> Result<(), StoreError> {
        redis::cmd("XACK")
            .arg(stream)
            .arg(group)
            .arg(id)
            .query_async::<_, ()>(&mut self.conn())
            .await
            .map_err(map_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_url() {
        let config = RedisStoreConfig {
            host: "redis.local".to_string(),
            port: 6380,
            db: 2,
        };
        assert_eq!(config.url(), "redis://redis.local:6380/2");
        assert_eq!(RedisStoreConfig::default().url(), "redis://127.0.0.1:6379/0");
    }

    #[test]
    fn test_millis_never_zero() {
        assert_eq!(millis(Duration::ZERO), 1);
        assert_eq!(millis(Duration::from_secs(2)), 2000);
    }
}
