//! 通知渠道 trait 定义

use anyhow::Result;
use async_trait::async_trait;

/// 单次投递的传输层结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryOutcome {
    /// 网关返回的 HTTP 状态码
    pub status: u16,
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 发送结果
#[derive(Debug, Clone, PartialEq)]
pub enum SendResult {
    /// 发送成功
    Sent,
    /// 发送失败
    Failed(String),
}

impl SendResult {
    /// 将传输层结果归类为发送结果
    pub fn from_outcome(outcome: Result<DeliveryOutcome>) -> Self {
        match outcome {
            Ok(o) if o.is_success() => SendResult::Sent,
            Ok(o) => SendResult::Failed(format!("gateway returned status {}", o.status)),
            Err(e) => SendResult::Failed(e.to_string()),
        }
    }
}

/// 短信网关 trait
///
/// 每次调用只投递给一个接收者，由 `NotificationDispatcher` 负责并发扇出。
#[async_trait]
pub trait Notifier: Send + Sync {
    /// 渠道名称（用于日志）
    fn name(&self) -> &str;

    /// 发送一条文本消息
    async fn send_text(&self, sender: &str, recipient: &str, body: &str) -> Result<DeliveryOutcome>;
}
