//! State Store Adapters - 共享状态存储实现
//!
//! - memory: 进程内实现（DashMap），测试与单进程演示
//! - redis_store: Redis 实现，多进程部署

mod memory;
mod redis_store;

pub use memory::InMemoryStateStore;
pub use redis_store::{RedisStateStore, RedisStoreConfig};

use std::sync::Arc;

use crate::application::ports::{StateStorePort, StoreError};
use crate::config::{StoreBackend, StoreConfig};

/// 按配置创建存储
pub async fn connect_store(config: &StoreConfig) -> Result<Arc<dyn StateStorePort>, StoreError> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, state is not shared across processes");
            Ok(Arc::new(InMemoryStateStore::new()))
        }
        StoreBackend::Redis => {
            let redis_config = RedisStoreConfig {
                host: config.host.clone(),
                port: config.port,
                db: config.db,
            };
            Ok(Arc::new(RedisStateStore::connect(&redis_config).await?))
        }
    }
}
