//! In-Memory State Store Implementation
//!
//! 单进程内的共享状态存储，语义与 Redis 子集一致：TTL、hash、set、
//! 带消费组和待确认列表（PEL）的 stream。用于测试和单进程演示

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::application::ports::{ReadCursor, StateStorePort, StoreError, StreamEntry};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Hash(HashMap<String, String>),
    Set(BTreeSet<String>),
    Stream(StreamData),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Hash(_) => "hash",
            Value::Set(_) => "set",
            Value::Stream(_) => "stream",
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    expires_at: Option<Instant>,
}

impl Slot {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|t| t <= now).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default)]
struct StreamData {
    /// seq -> fields
    entries: BTreeMap<u64, HashMap<String, String>>,
    next_seq: u64,
    groups: HashMap<String, GroupState>,
}

#[derive(Debug, Clone, Default)]
struct GroupState {
    /// 已投递的最大 seq
    last_delivered: u64,
    /// seq -> consumer
    pending: BTreeMap<u64, String>,
}

fn entry_id(seq: u64) -> String {
    format!("{}-0", seq)
}

fn parse_id(id: &str) -> Result<u64, StoreError> {
    id.split('-')
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| StoreError::Command(format!("invalid stream id: {}", id)))
}

fn wrong_type(key: &str, found: &Value) -> StoreError {
    StoreError::Command(format!(
        "WRONGTYPE key {} holds a {}",
        key,
        found.type_name()
    ))
}

/// 内存状态存储
pub struct InMemoryStateStore {
    data: DashMap<String, Slot>,
    /// 每次 xadd 递增，阻塞读取据此唤醒
    version: watch::Sender<u64>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            data: DashMap::new(),
            version,
        }
    }

    /// 惰性删除已过期的 key
    fn purge(&self, key: &str) {
        let now = Instant::now();
        self.data.remove_if(key, |_, slot| slot.is_expired(now));
    }

    fn try_read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        cursor: ReadCursor,
        count: usize,
    ) -> Result<Vec<StreamEntry>, StoreError> {
        self.purge(stream);
        let mut slot = self.data.get_mut(stream).ok_or_else(|| {
            StoreError::Command(format!("NOGROUP no such key {} or group {}", stream, group))
        })?;
        let data = match &mut slot.value {
            Value::Stream(data) => data,
            other => return Err(wrong_type(stream, other)),
        };
        let StreamData {
            entries, groups, ..
        } = data;
        let state = groups.get_mut(group).ok_or_else(|| {
            StoreError::Command(format!("NOGROUP no such group {} for {}", group, stream))
        })?;

        let mut out = Vec::new();
        match cursor {
            ReadCursor::Pending => {
                for (seq, owner) in state.pending.iter() {
                    if out.len() >= count {
                        break;
                    }
                    if owner != consumer {
                        continue;
                    }
                    out.push(StreamEntry {
                        id: entry_id(*seq),
                        fields: entries.get(seq).cloned().unwrap_or_default(),
                    });
                }
            }
            ReadCursor::New => {
                let start = state.last_delivered + 1;
                for (seq, fields) in entries.range(start..).take(count) {
                    state.last_delivered = *seq;
                    state.pending.insert(*seq, consumer.to_string());
                    out.push(StreamEntry {
                        id: entry_id(*seq),
                        fields: fields.clone(),
                    });
                }
            }
        }
        Ok(out)
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStorePort for InMemoryStateStore {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut slot = Slot::new(Value::Str(value.to_string()));
        slot.expires_at = ttl.map(|t| Instant::now() + t);
        self.data.insert(key.to_string(), slot);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.purge(key);
        match self.data.get(key) {
            None => Ok(None),
            Some(slot) => match &slot.value {
                Value::Str(s) => Ok(Some(s.clone())),
                other => Err(wrong_type(key, other)),
            },
        }
    }

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<(), StoreError> {
        self.purge(key);
        let mut slot = self
            .data
            .entry(key.to_string())
            .or_insert_with(|| Slot::new(Value::Hash(HashMap::new())));
        match &mut slot.value {
            Value::Hash(map) => {
                for (k, v) in fields {
                    map.insert(k.clone(), v.clone());
                }
                Ok(())
            }
            other => Err(wrong_type(key, other)),
        }
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        self.purge(key);
        match self.data.get(key) {
            None => Ok(None),
            Some(slot) => match &slot.value {
                Value::Hash(map) => Ok(map.get(field).cloned()),
                other => Err(wrong_type(key, other)),
            },
        }
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        self.purge(key);
        match self.data.get(key) {
            None => Ok(HashMap::new()),
            Some(slot) => match &slot.value {
                Value::Hash(map) => Ok(map.clone()),
                other => Err(wrong_type(key, other)),
            },
        }
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<(), StoreError> {
        self.purge(key);
        let mut slot = self
            .data
            .entry(key.to_string())
            .or_insert_with(|| Slot::new(Value::Set(BTreeSet::new())));
        match &mut slot.value {
            Value::Set(set) => {
                set.insert(member.to_string());
                Ok(())
            }
            other => Err(wrong_type(key, other)),
        }
    }

    async fn srem(&self, key: &str, member: &str) -> Result<(), StoreError> {
        self.purge(key);
        let now_empty = match self.data.get_mut(key) {
            None => return Ok(()),
            Some(mut slot) => match &mut slot.value {
                Value::Set(set) => {
                    set.remove(member);
                    set.is_empty()
                }
                other => return Err(wrong_type(key, other)),
            },
        };
        if now_empty {
            self.data.remove(key);
        }
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.purge(key);
        match self.data.get(key) {
            None => Ok(Vec::new()),
            Some(slot) => match &slot.value {
                Value::Set(set) => Ok(set.iter().cloned().collect()),
                other => Err(wrong_type(key, other)),
            },
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.purge(key);
        Ok(self.data.contains_key(key))
    }

    async fn del(&self, keys: &[String]) -> Result<usize, StoreError> {
        let mut removed = 0;
        for key in keys {
            self.purge(key);
            if self.data.remove(key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.purge(key);
        if ttl.is_zero() {
            return Ok(self.data.remove(key).is_some());
        }
        match self.data.get_mut(key) {
            None => Ok(false),
            Some(mut slot) => {
                slot.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        self.purge(key);
        let now = Instant::now();
        Ok(self
            .data
            .get(key)
            .and_then(|slot| slot.expires_at)
            .map(|t| t.saturating_duration_since(now)))
    }

    async fn xadd(&self, stream: &str, fields: &[(String, String)]) -> Result<String, StoreError> {
        self.purge(stream);
        let id = {
            let mut slot = self
                .data
                .entry(stream.to_string())
                .or_insert_with(|| Slot::new(Value::Stream(StreamData::default())));
            match &mut slot.value {
                Value::Stream(data) => {
                    data.next_seq += 1;
                    let seq = data.next_seq;
                    data.entries.insert(seq, fields.iter().cloned().collect());
                    entry_id(seq)
                }
                other => return Err(wrong_type(stream, other)),
            }
        };
        self.version.send_modify(|v| *v += 1);
        Ok(id)
    }

    async fn xgroup_create(&self, stream: &str, group: &str) -> Result<(), StoreError> {
        self.purge(stream);
        let mut slot = self
            .data
            .entry(stream.to_string())
            .or_insert_with(|| Slot::new(Value::Stream(StreamData::default())));
        match &mut slot.value {
            Value::Stream(data) => {
                data.groups.entry(group.to_string()).or_default();
                Ok(())
            }
            other => Err(wrong_type(stream, other)),
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
        let mut changes = self.version.subscribe();
        let deadline = block.map(|b| Instant::now() + b);

        loop {
            changes.borrow_and_update();
            let entries = self.try_read_group(stream, group, consumer, cursor, count)?;
            // 与 Redis 一致：读取历史（PEL）时不阻塞
            if !entries.is_empty() || cursor == ReadCursor::Pending {
                return Ok(entries);
            }

            let Some(deadline) = deadline else {
                return Ok(entries);
            };
            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }
            match tokio::time::timeout(deadline - now, changes.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) | Err(_) => return Ok(Vec::new()),
            }
        }
    }

    async fn xack(&self, stream: &str, group: &str, id: &str) -> Result<(), StoreError> {
        let seq = parse_id(id)?;
        self.purge(stream);
        if let Some(mut slot) = self.data.get_mut(stream) {
            if let Value::Stream(data) = &mut slot.value {
                if let Some(state) = data.groups.get_mut(group) {
                    state.pending.remove(&seq);
                }
            }
        }
        Ok(())
    }
}
