//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::time::Duration;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// HTTP 入口配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 共享存储配置
    #[serde(default)]
    pub store: StoreConfig,

    /// 任务配置
    #[serde(default)]
    pub task: TaskConfig,

    /// runner 心跳与消费配置
    #[serde(default)]
    pub runner: RunnerConfig,

    /// runner 池配置
    #[serde(default)]
    pub pool: PoolConfig,

    /// 调度重试配置
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// 模型配置
    #[serde(default)]
    pub model: ModelConfig,

    /// 回调通知配置
    #[serde(default)]
    pub notify: NotifyConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// HTTP 入口配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Redis,
    /// 进程内存储，只适合单进程演示与测试
    Memory,
}

/// 共享存储配置
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    #[serde(default = "default_store_host")]
    pub host: String,

    #[serde(default = "default_store_port")]
    pub port: u16,

    /// 逻辑库编号
    #[serde(default)]
    pub db: i64,
}

fn default_store_host() -> String {
    "127.0.0.1".to_string()
}

fn default_store_port() -> u16 {
    6379
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            host: default_store_host(),
            port: default_store_port(),
            db: 0,
        }
    }
}

/// 任务配置
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// 任务及其派生记录的生命周期（秒）
    #[serde(default = "default_task_lifetime")]
    pub lifetime_secs: u64,
}

fn default_task_lifetime() -> u64 {
    3600
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            lifetime_secs: default_task_lifetime(),
        }
    }
}

impl TaskConfig {
    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_secs)
    }
}

/// runner 配置
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// 心跳 key 的 TTL（秒），大于刷新周期且不超过两个周期
    #[serde(default = "default_heartbeat_ttl")]
    pub heartbeat_ttl_secs: u64,

    /// 心跳刷新周期（秒）
    #[serde(default = "default_heartbeat_period")]
    pub heartbeat_period_secs: u64,

    /// 新进程写入首次心跳前的宽限（秒）
    #[serde(default = "default_startup_grace")]
    pub startup_grace_secs: u64,

    /// 流读取阻塞时长（毫秒）
    #[serde(default = "default_block_ms")]
    pub block_ms: u64,
}

fn default_heartbeat_ttl() -> u64 {
    5
}

fn default_heartbeat_period() -> u64 {
    3
}

fn default_startup_grace() -> u64 {
    60
}

fn default_block_ms() -> u64 {
    1000
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            heartbeat_ttl_secs: default_heartbeat_ttl(),
            heartbeat_period_secs: default_heartbeat_period(),
            startup_grace_secs: default_startup_grace(),
            block_ms: default_block_ms(),
        }
    }
}

impl RunnerConfig {
    pub fn heartbeat_ttl(&self) -> Duration {
        Duration::from_secs(self.heartbeat_ttl_secs)
    }

    pub fn heartbeat_period(&self) -> Duration {
        Duration::from_secs(self.heartbeat_period_secs)
    }

    pub fn block(&self) -> Duration {
        Duration::from_millis(self.block_ms)
    }

    /// 判定 runner 死亡的宽限：心跳 TTL + 启动宽限
    pub fn reap_grace(&self) -> Duration {
        Duration::from_secs(self.heartbeat_ttl_secs + self.startup_grace_secs)
    }
}

/// runner 池配置
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// 名额上限
    #[serde(default = "default_max_runners")]
    pub max_runners: usize,
}

fn default_max_runners() -> usize {
    10
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_runners: default_max_runners(),
        }
    }
}

/// 调度重试配置
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_retry_interval")]
    pub retry_interval_ms: u64,

    /// 资源耗尽时的最大重试次数，0 表示不重试
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_retry_interval() -> u64 {
    2000
}

fn default_max_retries() -> u32 {
    30
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: default_retry_interval(),
            max_retries: default_max_retries(),
        }
    }
}

impl DispatchConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

/// 模型后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelBackend {
    /// 调试模型，固定返回
    #[default]
    Fake,
    /// 远程推理服务
    Http,
}

/// 模型配置
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub backend: ModelBackend,

    /// 推理服务基础 URL（http 后端）
    #[serde(default = "default_model_url")]
    pub url: String,

    /// 注册的模型名称
    #[serde(default = "default_model_names")]
    pub names: Vec<String>,

    /// 单次推理超时（秒）
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
}

fn default_model_url() -> String {
    "http://localhost:9000".to_string()
}

fn default_model_names() -> Vec<String> {
    [
        "hat",
        "intrusion",
        "wandering",
        "lightning_rod_current_meter",
        "cabinet_meter",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_model_timeout() -> u64 {
    120
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: ModelBackend::default(),
            url: default_model_url(),
            names: default_model_names(),
            timeout_secs: default_model_timeout(),
        }
    }
}

/// 回调通知配置
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_notify_timeout")]
    pub timeout_secs: u64,
}

fn default_notify_timeout() -> u64 {
    10
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_notify_timeout(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
