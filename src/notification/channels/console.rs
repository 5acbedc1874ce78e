//! 控制台渠道 - dry-run 时只打印消息，不调用短信网关

use crate::notification::channel::{DeliveryOutcome, Notifier};
use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

/// 控制台渠道
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    fn name(&self) -> &str {
        "console"
    }

    async fn send_text(&self, sender: &str, recipient: &str, body: &str) -> Result<DeliveryOutcome> {
        info!(from = %sender, to = %recipient, "[DRY-RUN] Would send message");
        println!("[通知] {} -> {}: {}", sender, recipient, body);
        Ok(DeliveryOutcome { status: 200 })
    }
}
