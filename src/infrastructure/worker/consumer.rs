//! Stream Consumer Loop - 消费/处理/确认循环
//!
//! 每条消息处理完成后才 ack。存储连接错误直接向上返回（进程退出，由外部监管重启，
//! 未 ack 的消息在同名消费者重启后重新投递）；其它处理错误记录日志后 ack 丢弃

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::WorkerError;
use crate::application::services::{Stream, StreamMessage};

#[async_trait]
pub trait MessageHandler: Send {
    async fn handle(
        &mut self,
        msg: &StreamMessage,
        cancel: &CancellationToken,
    ) -> Result<(), WorkerError>;

    /// 消息确认之后调用
    async fn after_ack(&mut self) -> Result<(), WorkerError> {
        Ok(())
    }
}

/// 循环消费直到 `cancel` 触发；取消在当前阻塞读取返回后生效
pub async fn consume<H: MessageHandler>(
    stream: &Stream,
    consumer: &str,
    block: Duration,
    cancel: &CancellationToken,
    handler: &mut H,
) -> Result<(), WorkerError> {
    tracing::info!(
        stream = %stream.name(),
        group = %stream.group(),
        consumer = %consumer,
        "Start message loop"
    );

    while !cancel.is_cancelled() {
        let messages = stream.pull(consumer, 1, block).await?;

        for msg in messages {
            tracing::info!(stream = %stream.name(), message_id = %msg.id, "Message received");
            tracing::debug!(message_id = %msg.id, data = ?msg.data, "Message body");

            if let Err(e) = handler.handle(&msg, cancel).await {
                if e.is_transient() {
                    tracing::error!(message_id = %msg.id, error = %e, "Store unavailable, leaving message unacknowledged");
                    return Err(e);
                }
                tracing::error!(message_id = %msg.id, error = %e, "Message processing failed, dropping");
            }

            msg.ack().await?;
            handler.after_ack().await?;
        }
    }

    tracing::info!(stream = %stream.name(), consumer = %consumer, "Message loop stopped");
    Ok(())
}
