//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 环境变量前缀
const ENV_PREFIX: &str = "GW";

/// 加载应用配置
///
/// # 环境变量示例
/// - `GW_STORE__HOST=redis.internal`
/// - `GW_POOL__MAX_RUNNERS=4`
/// - `GW_MODEL__BACKEND=http`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder()
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8000)?
        .set_default("store.backend", "redis")?
        .set_default("store.host", "127.0.0.1")?
        .set_default("store.port", 6379)?
        .set_default("store.db", 0)?
        .set_default("task.lifetime_secs", 3600)?
        .set_default("runner.heartbeat_ttl_secs", 5)?
        .set_default("runner.heartbeat_period_secs", 3)?
        .set_default("runner.startup_grace_secs", 60)?
        .set_default("runner.block_ms", 1000)?
        .set_default("pool.max_runners", 10)?
        .set_default("dispatch.retry_interval_ms", 2000)?
        .set_default("dispatch.max_retries", 30)?
        .set_default("model.backend", "fake")?
        .set_default("model.url", "http://localhost:9000")?
        .set_default("model.timeout_secs", 120)?
        .set_default("notify.timeout_secs", 10)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // GW_STORE__HOST -> store.host；model.names 接受逗号分隔
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("model.names")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

    if config.server.port == 0 {
        return invalid("Server port cannot be 0");
    }

    if config.store.host.is_empty() {
        return invalid("Store host cannot be empty");
    }

    if config.runner.heartbeat_period_secs == 0 {
        return invalid("Heartbeat period cannot be 0");
    }

    // 错过一次刷新仍存活，连续错过两次即判死
    if config.runner.heartbeat_ttl_secs <= config.runner.heartbeat_period_secs {
        return invalid("Heartbeat TTL must be greater than heartbeat period");
    }
    if config.runner.heartbeat_ttl_secs > config.runner.heartbeat_period_secs * 2 {
        return invalid("Heartbeat TTL must not exceed two heartbeat periods");
    }

    if config.pool.max_runners == 0 {
        return invalid("Pool max_runners cannot be 0");
    }

    if config.task.lifetime_secs == 0 {
        return invalid("Task lifetime cannot be 0");
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}", config.server.addr());
    tracing::info!(
        "Store: {:?} {}:{} db {}",
        config.store.backend,
        config.store.host,
        config.store.port,
        config.store.db
    );
    tracing::info!("Task Lifetime: {}s", config.task.lifetime_secs);
    tracing::info!(
        "Heartbeat: ttl {}s, period {}s",
        config.runner.heartbeat_ttl_secs,
        config.runner.heartbeat_period_secs
    );
    tracing::info!("Max Runners: {}", config.pool.max_runners);
    tracing::info!(
        "Dispatch Retry: every {}ms, at most {} times",
        config.dispatch.retry_interval_ms,
        config.dispatch.max_retries
    );
    tracing::info!("Model Backend: {:?}", config.model.backend);
    tracing::info!("Models: {}", config.model.names.join(", "));
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}
