//! Heartbeat - runner 存活心跳
//!
//! 启动时立即写入，之后按固定周期刷新；TTL 大于周期，
//! 错过一次不会被判死，连续错过两次才会。取消后清除心跳 key

use chrono::Utc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::application::services::runner_pool::Runner;

pub struct HeartbeatLoop {
    runner: Runner,
    ttl: Duration,
    period: Duration,
}

impl HeartbeatLoop {
    pub fn new(runner: Runner, ttl: Duration, period: Duration) -> Self {
        Self {
            runner,
            ttl,
            period,
        }
    }

    /// 运行直到 `cancel` 被触发，退出前清除心跳
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::debug!(
            runner = %self.runner.name(),
            ttl_ms = self.ttl.as_millis() as u64,
            period_ms = self.period.as_millis() as u64,
            "Heartbeat started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.runner.update_heartbeat(Utc::now(), self.ttl).await {
                        tracing::warn!(runner = %self.runner.name(), error = %e, "Heartbeat update failed");
                    }
                }
            }
        }

        match self.runner.clean_heartbeat().await {
            Ok(()) => tracing::debug!(runner = %self.runner.name(), "Heartbeat cleared"),
            Err(e) => {
                tracing::warn!(runner = %self.runner.name(), error = %e, "Failed to clear heartbeat")
            }
        }
    }
}
